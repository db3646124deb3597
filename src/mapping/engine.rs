//! The mapping engine
//!
//! A synchronous state machine: every handler takes the current time, mutates the
//! engine state and returns the outputs it produced, in emission order. Threading,
//! timers and the actual sink live in [`crate::mapping::mapping_handle`].
//!
//! # Data flow
//!
//! ```text
//! button edge ──────────────────────────┐
//! trigger sample ──► hysteresis ──► edge ┼──► BindingTable ──► fire ──► Vec<EngineOutput>
//! stick sample ──► deadzone ──► StickTranslator ─────────────────┘
//! repeat tick ──► RepeatScheduler ──────────────────────────────────┘
//! ```

use crate::controller::axis::{apply_radial_deadzone, TriggerState};
use crate::mapping::bindings::BindingTable;
use crate::mapping::keyboard::{builtin_key, Modifier};
use crate::mapping::mapping_types::{
    Action, InputElement, Layer, StickId, TriggerId, MODIFIER_ELEMENT,
};
use crate::mapping::repeat::RepeatScheduler;
use crate::mapping::sink::{ClipboardProbe, EngineOutput, ObserverEvent, SinkCommand};
use crate::mapping::stick::{StickConfig, StickOutput, StickTranslator};
use std::time::Instant;
use tracing::{debug, info};

/// Mutable state of a running engine; reset on stop
#[derive(Debug, Default)]
pub struct EngineState {
    layer: Layer,
    repeats: RepeatScheduler,
    // hold order is kept so releases mirror it
    sticky: Vec<Modifier>,
    sticks: [StickTranslator; 2],
    triggers: [TriggerState; 2],
}

impl EngineState {
    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn held_sticky_modifiers(&self) -> &[Modifier] {
        &self.sticky
    }

    pub fn repeats(&self) -> &RepeatScheduler {
        &self.repeats
    }
}

fn stick_index(stick: StickId) -> usize {
    match stick {
        StickId::Left => 0,
        StickId::Right => 1,
    }
}

fn trigger_index(trigger: TriggerId) -> usize {
    match trigger {
        TriggerId::Left => 0,
        TriggerId::Right => 1,
    }
}

pub struct MappingEngine {
    bindings: BindingTable,
    config: StickConfig,
    clipboard: Box<dyn ClipboardProbe + Send>,
    state: EngineState,
}

impl MappingEngine {
    pub fn new(
        bindings: BindingTable,
        config: StickConfig,
        clipboard: Box<dyn ClipboardProbe + Send>,
    ) -> Self {
        info!(
            "Creating mapping engine: {} base / {} modifier bindings",
            bindings.len(Layer::Base),
            bindings.len(Layer::Modifier)
        );
        Self {
            bindings,
            config,
            clipboard,
            state: EngineState::default(),
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    pub fn stick_config(&self) -> &StickConfig {
        &self.config
    }

    /// True while at least one button repeat is registered
    pub fn needs_repeat_tick(&self) -> bool {
        self.state.repeats.is_active()
    }

    pub fn on_button_edge(
        &mut self,
        element: InputElement,
        pressed: bool,
        now: Instant,
    ) -> Vec<EngineOutput> {
        let mut out = Vec::new();

        if element == MODIFIER_ELEMENT {
            if pressed {
                debug!("Modifier layer on");
                self.state.layer = Layer::Modifier;
            } else {
                debug!("Modifier layer off");
                self.state.layer = Layer::Base;
                self.state.repeats.clear_layer(Layer::Modifier);
                self.release_sticky(&mut out);
            }
            return out;
        }

        // deregister first so a release always stops the repeat
        if !pressed && self.state.repeats.remove(element) {
            debug!("Repeat stopped for {}", element);
        }

        let layer = self.state.layer;
        let Some(entry) = self.bindings.entry(layer, element) else {
            if layer == Layer::Modifier && pressed {
                out.push(EngineOutput::Notify(ObserverEvent::NotCustomizable { element }));
            }
            return out;
        };

        let action = entry.action.clone();
        let description = entry.description.clone();
        let repeat = entry.repeat;
        let trigger_mode = entry.trigger_mode;

        if trigger_mode.should_fire(pressed) {
            info!(
                "{} {} -> {}",
                element,
                if pressed { "pressed" } else { "released" },
                description.as_deref().unwrap_or("(no description)")
            );
            self.fire(Some(element), action, description, &mut out);
        }

        if pressed {
            if let Some(policy) = repeat {
                self.state.repeats.register(element, layer, policy, now);
            }
        }

        out
    }

    pub fn on_trigger_sample(
        &mut self,
        trigger: TriggerId,
        value: f32,
        now: Instant,
    ) -> Vec<EngineOutput> {
        let transition = self.state.triggers[trigger_index(trigger)].update(
            value,
            self.config.trigger_press_threshold,
            self.config.trigger_release_threshold,
        );
        match transition {
            Some(pressed) => self.on_button_edge(trigger.element(), pressed, now),
            None => Vec::new(),
        }
    }

    pub fn on_stick_sample(
        &mut self,
        stick: StickId,
        x: f32,
        y: f32,
        now: Instant,
    ) -> Vec<EngineOutput> {
        let (x, y) = apply_radial_deadzone(x, y, self.config.deadzone(stick));
        let behavior = self.config.layout(stick).for_layer(self.state.layer);
        let stick_outputs =
            self.state.sticks[stick_index(stick)].update(behavior, x, y, now, &self.config);

        let mut out = Vec::new();
        for output in stick_outputs {
            match output {
                StickOutput::Fire {
                    action,
                    description,
                } => {
                    info!("{:?} stick -> {}", stick, description);
                    self.fire(None, action, Some(description.to_string()), &mut out);
                }
                StickOutput::Command(command) => out.push(EngineOutput::Sink(command)),
                StickOutput::Notify(event) => out.push(EngineOutput::Notify(event)),
            }
        }
        out
    }

    /// Fires every due button repeat; repeats produce sink commands only
    pub fn on_repeat_tick(&mut self, now: Instant) -> Vec<EngineOutput> {
        let mut out = Vec::new();
        for (element, layer) in self.state.repeats.tick(now) {
            // a binding that vanished is a silent miss
            if let Some(entry) = self.bindings.entry(layer, element) {
                let action = entry.action.clone();
                self.action_commands(&action, &mut out);
            }
        }
        out
    }

    /// Releases held modifiers and returns the engine to its initial state
    pub fn stop(&mut self) -> Vec<EngineOutput> {
        info!("Stopping mapping engine");
        let mut out = Vec::new();
        self.release_sticky(&mut out);
        self.state.layer = Layer::Base;
        self.state.repeats.clear();
        self.state.sticks.iter_mut().for_each(StickTranslator::reset);
        self.state.triggers.iter_mut().for_each(TriggerState::reset);
        out
    }

    fn fire(
        &mut self,
        element: Option<InputElement>,
        action: Action,
        description: Option<String>,
        out: &mut Vec<EngineOutput>,
    ) {
        if !action.is_sticky() && !self.state.sticky.is_empty() {
            self.release_sticky(out);
        }
        out.push(EngineOutput::Notify(ObserverEvent::Fired {
            element,
            action: action.clone(),
            description,
        }));
        self.action_commands(&action, out);
    }

    fn action_commands(&mut self, action: &Action, out: &mut Vec<EngineOutput>) {
        let command = match action {
            Action::Keystroke { key, modifiers } => SinkCommand::keystroke(*key, modifiers),
            Action::StickyKeystroke {
                key,
                modifiers,
                sticky_modifiers,
            } => {
                for modifier in sticky_modifiers {
                    if !self.state.sticky.contains(modifier) {
                        self.state.sticky.push(*modifier);
                        out.push(EngineOutput::Sink(SinkCommand::HoldModifier(*modifier)));
                    }
                }
                let mut combined = modifiers.clone();
                for modifier in sticky_modifiers {
                    if !combined.contains(modifier) {
                        combined.push(*modifier);
                    }
                }
                SinkCommand::Keystroke {
                    key: *key,
                    modifiers: combined,
                }
            }
            Action::TypeText(text) => SinkCommand::TypeText(text.clone()),
            Action::SmartPaste => {
                let modifier = if self.clipboard.has_image() {
                    Modifier::Control
                } else {
                    Modifier::Command
                };
                SinkCommand::keystroke(builtin_key("v"), &[modifier])
            }
            Action::MouseClick(button) => SinkCommand::MouseClick(*button),
        };
        out.push(EngineOutput::Sink(command));
    }

    fn release_sticky(&mut self, out: &mut Vec<EngineOutput>) {
        for modifier in self.state.sticky.drain(..) {
            debug!("Releasing sticky {}", modifier);
            out.push(EngineOutput::Sink(SinkCommand::ReleaseModifier(modifier)));
        }
    }
}
