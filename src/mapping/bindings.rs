//! Binding table: which action each element fires in each layer
//!
//! The table is resolved once from the built-in defaults plus configuration
//! overrides and is immutable afterwards. Overrides that cannot be converted are
//! dropped individually so one typo never disables the rest of a profile.

use crate::config::ActionConfig;
use crate::mapping::error::MappingError;
use crate::mapping::keyboard::{Key, Modifier};
use crate::mapping::mapping_types::{
    Action, InputElement, Layer, MouseButton, RepeatPolicy, TriggerMode, MODIFIER_ELEMENT,
};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// A resolved binding
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindingEntry {
    pub action: Action,
    pub description: Option<String>,
    pub repeat: Option<RepeatPolicy>,
    pub trigger_mode: TriggerMode,
}

impl BindingEntry {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            description: None,
            repeat: None,
            trigger_mode: TriggerMode::OnPress,
        }
    }

    pub fn described(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn repeating(mut self, policy: RepeatPolicy) -> Self {
        self.repeat = Some(policy);
        self
    }

    pub fn with_trigger_mode(mut self, mode: TriggerMode) -> Self {
        self.trigger_mode = mode;
        self
    }
}

/// One configuration override before conversion
#[derive(Clone, Debug)]
pub struct BindingOverride {
    pub layer: Layer,
    pub element: String,
    pub action: ActionConfig,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BindingTable {
    layers: [HashMap<InputElement, BindingEntry>; 2],
}

impl BindingTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, layer: Layer, element: InputElement, entry: BindingEntry) {
        self.layers[layer.index()].insert(element, entry);
    }

    /// Binding for `element` in exactly `layer`; there is no fallback between layers
    pub fn entry(&self, layer: Layer, element: InputElement) -> Option<&BindingEntry> {
        self.layers[layer.index()].get(&element)
    }

    pub fn len(&self, layer: Layer) -> usize {
        self.layers[layer.index()].len()
    }

    /// All bindings, base layer first, elements in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (Layer, InputElement, &BindingEntry)> + '_ {
        Layer::ALL.into_iter().flat_map(move |layer| {
            InputElement::ALL
                .into_iter()
                .filter_map(move |element| {
                    self.entry(layer, element).map(|entry| (layer, element, entry))
                })
        })
    }
}

/// Merges overrides into `defaults`.
///
/// An override replaces the whole default entry of its (layer, element). Entries that
/// fail to convert are logged, reported in the returned list and leave the default
/// untouched.
pub fn resolve(
    defaults: BindingTable,
    overrides: &[BindingOverride],
) -> (BindingTable, Vec<MappingError>) {
    let mut table = defaults;
    let mut errors = Vec::new();

    for binding in overrides {
        let element = match InputElement::from_name(&binding.element) {
            Some(element) => element,
            None => {
                warn!(
                    "Dropping {} layer override: unknown element '{}'",
                    binding.layer, binding.element
                );
                errors.push(MappingError::UnknownElement(binding.element.clone()));
                continue;
            }
        };

        if element == MODIFIER_ELEMENT {
            warn!(
                "Dropping {} layer override for {}: it switches layers and never fires",
                binding.layer, element
            );
            errors.push(MappingError::ConfigError(format!(
                "{} is the layer modifier and cannot be bound",
                element
            )));
            continue;
        }

        match BindingEntry::try_from(&binding.action) {
            Ok(entry) => {
                debug!("Override {} / {}: {}", binding.layer, element, entry.action);
                table.insert(binding.layer, element, entry);
            }
            Err(e) => {
                warn!(
                    "Dropping {} layer override for {}: {}",
                    binding.layer, element, e
                );
                errors.push(e);
            }
        }
    }

    info!(
        "Binding table resolved: {} base, {} modifier bindings, {} overrides rejected",
        table.len(Layer::Base),
        table.len(Layer::Modifier),
        errors.len()
    );
    (table, errors)
}

impl TryFrom<&ActionConfig> for BindingEntry {
    type Error = MappingError;

    fn try_from(config: &ActionConfig) -> Result<Self, Self::Error> {
        let action = match config.action_type.as_str() {
            "keystroke" => Action::Keystroke {
                key: required_key(config)?,
                modifiers: parse_modifiers(&config.modifiers)?,
            },
            "sticky_keystroke" => Action::StickyKeystroke {
                key: required_key(config)?,
                modifiers: parse_modifiers(&config.modifiers)?,
                sticky_modifiers: parse_modifiers(&config.sticky_modifiers)?,
            },
            "type_text" => match &config.text {
                Some(text) => Action::TypeText(text.clone()),
                None => {
                    return Err(MappingError::MissingField {
                        field: "text",
                        context: "type_text action".to_string(),
                    })
                }
            },
            "smart_paste" => Action::SmartPaste,
            "mouse_click" => {
                let name = config
                    .button
                    .as_deref()
                    .ok_or_else(|| MappingError::MissingField {
                        field: "button",
                        context: "mouse_click action".to_string(),
                    })?;
                let button = MouseButton::from_name(name)
                    .ok_or_else(|| MappingError::UnknownMouseButton(name.to_string()))?;
                Action::MouseClick(button)
            }
            other => return Err(MappingError::UnknownActionType(other.to_string())),
        };

        let repeat = match &config.repeat {
            Some(repeat) => Some(
                RepeatPolicy::from_secs(repeat.delay, repeat.interval).ok_or_else(|| {
                    MappingError::InvalidRepeat(format!(
                        "delay {}s, interval {}s",
                        repeat.delay, repeat.interval
                    ))
                })?,
            ),
            None => None,
        };

        let trigger_mode = match config.trigger_mode.as_deref() {
            Some(name) => TriggerMode::from_name(name)
                .ok_or_else(|| MappingError::UnknownTriggerMode(name.to_string()))?,
            None => TriggerMode::default(),
        };

        Ok(BindingEntry {
            action,
            description: config.description.clone(),
            repeat,
            trigger_mode,
        })
    }
}

fn required_key(config: &ActionConfig) -> Result<Key, MappingError> {
    let name = config
        .key
        .as_deref()
        .ok_or_else(|| MappingError::MissingField {
            field: "key",
            context: format!("{} action", config.action_type),
        })?;
    Key::from_name(name).ok_or_else(|| MappingError::UnknownKey(name.to_string()))
}

fn parse_modifiers(names: &[String]) -> Result<Vec<Modifier>, MappingError> {
    names
        .iter()
        .map(|name| {
            Modifier::from_name(name).ok_or_else(|| MappingError::UnknownModifier(name.clone()))
        })
        .collect()
}

fn key(name: &'static str) -> Key {
    crate::mapping::keyboard::builtin_key(name)
}

const HOLD_REPEAT: RepeatPolicy = RepeatPolicy::from_millis(400, 20);

/// Built-in bindings for a terminal-based coding assistant workflow
pub fn default_bindings() -> BindingTable {
    use InputElement::*;
    use Modifier::{Command, Control, Option as Opt, Shift};

    let mut table = BindingTable::empty();
    let base = [
        (ButtonA, BindingEntry::new(Action::keystroke(key("return"), &[])).described("Accept")),
        (ButtonB, BindingEntry::new(Action::keystroke(key("escape"), &[])).described("Cancel")),
        (
            ButtonX,
            BindingEntry::new(Action::keystroke(key("c"), &[Control])).described("Interrupt"),
        ),
        (ButtonY, BindingEntry::new(Action::SmartPaste).described("Paste")),
        (
            DpadUp,
            BindingEntry::new(Action::keystroke(key("up_arrow"), &[]))
                .described("History Up")
                .repeating(HOLD_REPEAT),
        ),
        (
            DpadDown,
            BindingEntry::new(Action::keystroke(key("down_arrow"), &[]))
                .described("History Down")
                .repeating(HOLD_REPEAT),
        ),
        (
            DpadLeft,
            BindingEntry::new(Action::keystroke(key("left_bracket"), &[Command, Shift]))
                .described("Prev Tab")
                .repeating(HOLD_REPEAT),
        ),
        (
            DpadRight,
            BindingEntry::new(Action::keystroke(key("right_bracket"), &[Command, Shift]))
                .described("Next Tab")
                .repeating(HOLD_REPEAT),
        ),
        (
            RightShoulder,
            BindingEntry::new(Action::keystroke(key("tab"), &[Shift])).described("Switch Mode"),
        ),
        (
            LeftTrigger,
            BindingEntry::new(Action::keystroke(key("space"), &[Opt]))
                .described("Voice-to-text")
                .with_trigger_mode(TriggerMode::OnPressAndRelease),
        ),
        (RightTrigger, BindingEntry::new(Action::keystroke(key("return"), &[])).described("Submit")),
        (
            LeftThumbstickButton,
            BindingEntry::new(Action::MouseClick(MouseButton::Right)).described("Right Click"),
        ),
        (
            RightThumbstickButton,
            BindingEntry::new(Action::MouseClick(MouseButton::Left)).described("Left Click"),
        ),
        (
            ButtonMenu,
            BindingEntry::new(Action::TypeText("/".to_string())).described("Slash Command"),
        ),
        (
            ButtonOptions,
            BindingEntry::new(Action::TypeText("/clear".to_string())).described("Clear Chat"),
        ),
    ];
    for (element, entry) in base {
        table.insert(Layer::Base, element, entry);
    }

    let modifier = [
        (ButtonY, BindingEntry::new(Action::keystroke(key("c"), &[Command])).described("Copy")),
        (
            ButtonB,
            BindingEntry::new(Action::keystroke(key("delete"), &[]))
                .described("Delete")
                .repeating(HOLD_REPEAT),
        ),
        (
            DpadLeft,
            BindingEntry::new(Action::StickyKeystroke {
                key: key("tab"),
                modifiers: vec![Shift],
                sticky_modifiers: vec![Command],
            })
            .described("Prev App"),
        ),
        (
            DpadRight,
            BindingEntry::new(Action::StickyKeystroke {
                key: key("tab"),
                modifiers: vec![],
                sticky_modifiers: vec![Command],
            })
            .described("Next App"),
        ),
        (
            LeftThumbstickButton,
            BindingEntry::new(Action::MouseClick(MouseButton::Right)).described("Right Click"),
        ),
        (
            RightThumbstickButton,
            BindingEntry::new(Action::MouseClick(MouseButton::Left)).described("Left Click"),
        ),
    ];
    for (element, entry) in modifier {
        table.insert(Layer::Modifier, element, entry);
    }

    table
}
