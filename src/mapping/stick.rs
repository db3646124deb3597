//! Analog stick translation
//!
//! A stick drives one of four behaviors depending on the active layer: arrow keys
//! with hysteresis and hold-to-repeat, scrolling, cursor movement, or the
//! application-switch gesture. Each stick has its own [`StickTranslator`] holding the
//! edge state of those behaviors.

use crate::mapping::error::MappingError;
use crate::mapping::keyboard::{builtin_key, Modifier};
use crate::mapping::mapping_types::{Action, Layer, RepeatPolicy, StickId};
use crate::mapping::repeat::RepeatClock;
use crate::mapping::sink::{ObserverEvent, ScrollDirection, SinkCommand};
use std::fmt;
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StickBehavior {
    ArrowKeys,
    Scroll,
    Cursor,
    AppSwitch,
}

impl StickBehavior {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "arrow_keys" => Some(StickBehavior::ArrowKeys),
            "scroll" => Some(StickBehavior::Scroll),
            "cursor" => Some(StickBehavior::Cursor),
            "app_switch" => Some(StickBehavior::AppSwitch),
            _ => None,
        }
    }
}

impl fmt::Display for StickBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StickBehavior::ArrowKeys => "arrow_keys",
            StickBehavior::Scroll => "scroll",
            StickBehavior::Cursor => "cursor",
            StickBehavior::AppSwitch => "app_switch",
        };
        f.write_str(name)
    }
}

/// Behavior of one stick per layer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StickLayout {
    pub base: StickBehavior,
    pub modifier: StickBehavior,
}

impl StickLayout {
    pub fn for_layer(&self, layer: Layer) -> StickBehavior {
        match layer {
            Layer::Base => self.base,
            Layer::Modifier => self.modifier,
        }
    }
}

/// Analog tuning shared by both sticks and triggers
#[derive(Clone, Debug, PartialEq)]
pub struct StickConfig {
    pub left_deadzone: f32,
    pub right_deadzone: f32,
    pub trigger_press_threshold: f32,
    pub trigger_release_threshold: f32,
    pub arrow_press_threshold: f32,
    pub arrow_release_threshold: f32,
    pub arrow_repeat: RepeatPolicy,
    pub scroll_sensitivity: f32,
    pub cursor_sensitivity: f32,
    pub left_layout: StickLayout,
    pub right_layout: StickLayout,
}

impl Default for StickConfig {
    fn default() -> Self {
        Self {
            left_deadzone: 0.3,
            right_deadzone: 0.2,
            trigger_press_threshold: 0.5,
            trigger_release_threshold: 0.3,
            arrow_press_threshold: 0.5,
            arrow_release_threshold: 0.3,
            arrow_repeat: RepeatPolicy::from_millis(150, 20),
            scroll_sensitivity: 15.0,
            cursor_sensitivity: 15.0,
            left_layout: StickLayout {
                base: StickBehavior::ArrowKeys,
                modifier: StickBehavior::AppSwitch,
            },
            right_layout: StickLayout {
                base: StickBehavior::Scroll,
                modifier: StickBehavior::Cursor,
            },
        }
    }
}

impl StickConfig {
    pub fn deadzone(&self, stick: StickId) -> f32 {
        match stick {
            StickId::Left => self.left_deadzone,
            StickId::Right => self.right_deadzone,
        }
    }

    pub fn layout(&self, stick: StickId) -> StickLayout {
        match stick {
            StickId::Left => self.left_layout,
            StickId::Right => self.right_layout,
        }
    }

    /// Replaces out-of-range values with their defaults.
    ///
    /// Threshold pairs are checked together: a pair whose release is not below its
    /// press is reset as a whole.
    pub fn validated(mut self) -> (Self, Vec<MappingError>) {
        let defaults = Self::default();
        let mut errors = Vec::new();

        let mut check = |name: &str, value: &mut f32, fallback: f32, valid: bool| {
            if !valid {
                warn!(
                    "Invalid stick setting {} = {}, using {}",
                    name, value, fallback
                );
                errors.push(MappingError::ConfigError(format!(
                    "{} out of range: {}",
                    name, value
                )));
                *value = fallback;
            }
        };

        let unit_deadzone = |v: f32| v.is_finite() && (0.0..1.0).contains(&v);
        let left = self.left_deadzone;
        check(
            "left_deadzone",
            &mut self.left_deadzone,
            defaults.left_deadzone,
            unit_deadzone(left),
        );
        let right = self.right_deadzone;
        check(
            "right_deadzone",
            &mut self.right_deadzone,
            defaults.right_deadzone,
            unit_deadzone(right),
        );

        let pair_valid = |press: f32, release: f32| {
            press.is_finite()
                && release.is_finite()
                && press > 0.0
                && press <= 1.0
                && release >= 0.0
                && release < press
        };
        if !pair_valid(self.trigger_press_threshold, self.trigger_release_threshold) {
            let press = self.trigger_press_threshold;
            check(
                "trigger_press_threshold",
                &mut self.trigger_press_threshold,
                defaults.trigger_press_threshold,
                false,
            );
            self.trigger_release_threshold = defaults.trigger_release_threshold;
            debug!("Trigger thresholds reset (press was {})", press);
        }
        if !pair_valid(self.arrow_press_threshold, self.arrow_release_threshold) {
            let press = self.arrow_press_threshold;
            check(
                "arrow_press_threshold",
                &mut self.arrow_press_threshold,
                defaults.arrow_press_threshold,
                false,
            );
            self.arrow_release_threshold = defaults.arrow_release_threshold;
            debug!("Arrow thresholds reset (press was {})", press);
        }

        let sensitivity = |v: f32| v.is_finite() && v >= 0.0;
        let scroll = self.scroll_sensitivity;
        check(
            "scroll_sensitivity",
            &mut self.scroll_sensitivity,
            defaults.scroll_sensitivity,
            sensitivity(scroll),
        );
        let cursor = self.cursor_sensitivity;
        check(
            "cursor_sensitivity",
            &mut self.cursor_sensitivity,
            defaults.cursor_sensitivity,
            sensitivity(cursor),
        );

        (self, errors)
    }
}

/// Result of one stick sample, interpreted by the engine
#[derive(Clone, Debug, PartialEq)]
pub enum StickOutput {
    /// Fire through the engine's action path (sticky protocol included)
    Fire {
        action: Action,
        description: &'static str,
    },
    /// Post directly, bypassing sticky handling
    Command(SinkCommand),
    Notify(ObserverEvent),
}

#[derive(Clone, Copy, Debug)]
struct ArrowDirection {
    key: &'static str,
    description: &'static str,
    /// Reads the half-axis from (x, y), positive means deflected this way
    project: fn(f32, f32) -> f32,
}

const ARROWS: [ArrowDirection; 4] = [
    ArrowDirection {
        key: "up_arrow",
        description: "Move Up",
        project: |_, y| y,
    },
    ArrowDirection {
        key: "down_arrow",
        description: "Move Down",
        project: |_, y| -y,
    },
    ArrowDirection {
        key: "right_arrow",
        description: "Move Right",
        project: |x, _| x,
    },
    ArrowDirection {
        key: "left_arrow",
        description: "Move Left",
        project: |x, _| -x,
    },
];

#[derive(Clone, Debug, Default)]
struct ScrollState {
    up: bool,
    down: bool,
    left: bool,
    right: bool,
}

#[derive(Clone, Debug, Default)]
pub struct StickTranslator {
    active: Option<StickBehavior>,
    // held arrows carry their repeat clock
    arrows: [Option<RepeatClock>; 4],
    scroll: ScrollState,
    cursor_active: bool,
    next_app_active: bool,
    prev_app_active: bool,
}

impl StickTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arrow_held(&self) -> bool {
        self.arrows.iter().any(Option::is_some)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Feeds one deadzone-corrected sample
    pub fn update(
        &mut self,
        behavior: StickBehavior,
        x: f32,
        y: f32,
        now: Instant,
        config: &StickConfig,
    ) -> Vec<StickOutput> {
        if self.active != Some(behavior) {
            if let Some(previous) = self.active {
                debug!("Stick behavior {} -> {}", previous, behavior);
                self.reset_behavior(previous);
            }
            self.active = Some(behavior);
        }

        match behavior {
            StickBehavior::ArrowKeys => self.arrow_keys(x, y, now, config),
            StickBehavior::Scroll => self.scroll(x, y, config),
            StickBehavior::Cursor => self.cursor(x, y, config),
            StickBehavior::AppSwitch => self.app_switch(x, config),
        }
    }

    fn reset_behavior(&mut self, behavior: StickBehavior) {
        match behavior {
            StickBehavior::ArrowKeys => self.arrows = [None; 4],
            StickBehavior::Scroll => self.scroll = ScrollState::default(),
            StickBehavior::Cursor => self.cursor_active = false,
            StickBehavior::AppSwitch => {
                self.next_app_active = false;
                self.prev_app_active = false;
            }
        }
    }

    fn arrow_keys(&mut self, x: f32, y: f32, now: Instant, config: &StickConfig) -> Vec<StickOutput> {
        let mut out = Vec::new();

        for (direction, held) in ARROWS.iter().zip(self.arrows.iter_mut()) {
            let value = (direction.project)(x, y);
            let key = builtin_key(direction.key);

            match held {
                None if value > config.arrow_press_threshold => {
                    *held = Some(RepeatClock::start(config.arrow_repeat, now));
                    out.push(StickOutput::Notify(ObserverEvent::Fired {
                        element: None,
                        action: Action::keystroke(key, &[]),
                        description: Some(direction.description.to_string()),
                    }));
                    out.push(StickOutput::Command(SinkCommand::keystroke(key, &[])));
                }
                Some(_) if value < config.arrow_release_threshold => {
                    // no key-up: every arrow post is a complete keystroke
                    *held = None;
                }
                Some(clock) => {
                    if clock.poll(now) {
                        out.push(StickOutput::Command(SinkCommand::keystroke(key, &[])));
                    }
                }
                None => {}
            }
        }

        out
    }

    fn scroll(&mut self, x: f32, y: f32, config: &StickConfig) -> Vec<StickOutput> {
        let mut out = Vec::new();
        let dx = (x * config.scroll_sensitivity) as i32;
        let dy = (y * config.scroll_sensitivity) as i32;

        let state = &mut self.scroll;
        let mut notify = |active: &mut bool, moving: bool, direction: ScrollDirection| {
            if moving && !*active {
                *active = true;
                out.push(StickOutput::Notify(ObserverEvent::ScrollDirection(direction)));
            } else if !moving {
                *active = false;
            }
        };

        if dy.abs() >= dx.abs() {
            notify(&mut state.up, dy > 0, ScrollDirection::Up);
            notify(&mut state.down, dy < 0, ScrollDirection::Down);
            state.left = false;
            state.right = false;
        } else {
            notify(&mut state.right, dx > 0, ScrollDirection::Right);
            notify(&mut state.left, dx < 0, ScrollDirection::Left);
            state.up = false;
            state.down = false;
        }

        if dx != 0 || dy != 0 {
            out.push(StickOutput::Command(SinkCommand::Scroll { dx, dy }));
        }
        out
    }

    fn cursor(&mut self, x: f32, y: f32, config: &StickConfig) -> Vec<StickOutput> {
        let dx = x * config.cursor_sensitivity;
        let dy = y * config.cursor_sensitivity;

        if dx == 0.0 && dy == 0.0 {
            self.cursor_active = false;
            return Vec::new();
        }

        let mut out = Vec::with_capacity(2);
        if !self.cursor_active {
            self.cursor_active = true;
            out.push(StickOutput::Notify(ObserverEvent::CursorActive));
        }
        out.push(StickOutput::Command(SinkCommand::CursorMove { dx, dy }));
        out
    }

    fn app_switch(&mut self, x: f32, config: &StickConfig) -> Vec<StickOutput> {
        let press = config.arrow_press_threshold;
        let release = config.arrow_release_threshold;
        let mut out = Vec::new();

        if !self.next_app_active && x > press {
            self.next_app_active = true;
            out.push(StickOutput::Fire {
                action: Action::StickyKeystroke {
                    key: builtin_key("tab"),
                    modifiers: vec![],
                    sticky_modifiers: vec![Modifier::Command],
                },
                description: "Next App",
            });
        } else if self.next_app_active && x < release {
            self.next_app_active = false;
        }

        if !self.prev_app_active && x < -press {
            self.prev_app_active = true;
            out.push(StickOutput::Fire {
                action: Action::StickyKeystroke {
                    key: builtin_key("tab"),
                    modifiers: vec![Modifier::Shift],
                    sticky_modifiers: vec![Modifier::Command],
                },
                description: "Prev App",
            });
        } else if self.prev_app_active && x > -release {
            self.prev_app_active = false;
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn frame(start: Instant, k: u64) -> Instant {
        start + Duration::from_micros(16_667 * k)
    }

    fn keystrokes(outputs: &[StickOutput]) -> usize {
        outputs
            .iter()
            .filter(|o| matches!(o, StickOutput::Command(SinkCommand::Keystroke { .. })))
            .count()
    }

    #[test]
    fn held_arrow_at_sixty_hz_fires_once_then_seven_repeats() {
        let config = StickConfig::default();
        let start = Instant::now();
        let mut stick = StickTranslator::new();
        let mut all = Vec::new();

        for k in 0..18 {
            all.extend(stick.update(StickBehavior::ArrowKeys, 0.0, 0.8, frame(start, k), &config));
        }
        let released = stick.update(StickBehavior::ArrowKeys, 0.0, 0.0, frame(start, 18), &config);

        assert_eq!(keystrokes(&all), 8);
        let notifications = all
            .iter()
            .filter(|o| matches!(o, StickOutput::Notify(_)))
            .count();
        assert_eq!(notifications, 1);
        assert!(released.is_empty());
        assert!(!stick.arrow_held());
    }

    #[test]
    fn arrow_hysteresis_band_keeps_hold() {
        let config = StickConfig::default();
        let now = Instant::now();
        let mut stick = StickTranslator::new();

        assert!(stick
            .update(StickBehavior::ArrowKeys, 0.45, 0.0, now, &config)
            .is_empty());
        assert_eq!(
            keystrokes(&stick.update(StickBehavior::ArrowKeys, 0.6, 0.0, now, &config)),
            1
        );
        stick.update(StickBehavior::ArrowKeys, 0.35, 0.0, now, &config);
        assert!(stick.arrow_held());
        stick.update(StickBehavior::ArrowKeys, 0.25, 0.0, now, &config);
        assert!(!stick.arrow_held());
    }

    #[test]
    fn scroll_notifies_dominant_axis_once() {
        let config = StickConfig::default();
        let now = Instant::now();
        let mut stick = StickTranslator::new();

        let first = stick.update(StickBehavior::Scroll, 0.2, 0.6, now, &config);
        assert_eq!(
            first,
            vec![
                StickOutput::Notify(ObserverEvent::ScrollDirection(ScrollDirection::Up)),
                StickOutput::Command(SinkCommand::Scroll { dx: 3, dy: 9 }),
            ]
        );

        let second = stick.update(StickBehavior::Scroll, 0.2, 0.6, now, &config);
        assert_eq!(second, vec![StickOutput::Command(SinkCommand::Scroll { dx: 3, dy: 9 })]);

        let sideways = stick.update(StickBehavior::Scroll, -0.7, 0.1, now, &config);
        assert_eq!(
            sideways[0],
            StickOutput::Notify(ObserverEvent::ScrollDirection(ScrollDirection::Left))
        );
    }

    #[test]
    fn tiny_scroll_truncates_to_nothing() {
        let config = StickConfig::default();
        let mut stick = StickTranslator::new();
        let out = stick.update(StickBehavior::Scroll, 0.05, -0.05, Instant::now(), &config);
        assert!(out.is_empty());
    }

    #[test]
    fn cursor_notifies_once_per_deflection() {
        let config = StickConfig::default();
        let now = Instant::now();
        let mut stick = StickTranslator::new();

        let first = stick.update(StickBehavior::Cursor, 0.5, 0.0, now, &config);
        assert_eq!(first.len(), 2);
        let second = stick.update(StickBehavior::Cursor, 0.5, 0.1, now, &config);
        assert_eq!(second.len(), 1);
        assert!(stick.update(StickBehavior::Cursor, 0.0, 0.0, now, &config).is_empty());
        let again = stick.update(StickBehavior::Cursor, -0.2, 0.0, now, &config);
        assert_eq!(again[0], StickOutput::Notify(ObserverEvent::CursorActive));
    }

    #[test]
    fn app_switch_fires_once_per_flick() {
        let config = StickConfig::default();
        let now = Instant::now();
        let mut stick = StickTranslator::new();

        let fired: Vec<StickOutput> = [0.6, 0.9, 0.4, 0.9, 0.2, 0.7, -0.8]
            .into_iter()
            .flat_map(|x| stick.update(StickBehavior::AppSwitch, x, 0.0, now, &config))
            .collect();

        let descriptions: Vec<&str> = fired
            .iter()
            .filter_map(|o| match o {
                StickOutput::Fire { description, .. } => Some(*description),
                _ => None,
            })
            .collect();
        assert_eq!(descriptions, vec!["Next App", "Next App", "Prev App"]);
    }

    #[test]
    fn behavior_switch_resets_left_behind_state() {
        let config = StickConfig::default();
        let now = Instant::now();
        let mut stick = StickTranslator::new();

        stick.update(StickBehavior::ArrowKeys, 0.9, 0.0, now, &config);
        assert!(stick.arrow_held());

        stick.update(StickBehavior::AppSwitch, 0.9, 0.0, now, &config);
        assert!(!stick.arrow_held());

        // back in arrow mode the still-deflected stick is a fresh onset
        let out = stick.update(StickBehavior::ArrowKeys, 0.9, 0.0, now, &config);
        assert_eq!(keystrokes(&out), 1);
    }

    #[test]
    fn invalid_config_values_fall_back() {
        let config = StickConfig {
            left_deadzone: 1.5,
            arrow_press_threshold: 0.2,
            arrow_release_threshold: 0.4,
            scroll_sensitivity: f32::NAN,
            ..StickConfig::default()
        };
        let (validated, errors) = config.validated();

        assert_eq!(errors.len(), 3);
        assert_eq!(validated.left_deadzone, 0.3);
        assert_eq!(validated.arrow_press_threshold, 0.5);
        assert_eq!(validated.arrow_release_threshold, 0.3);
        assert_eq!(validated.scroll_sensitivity, 15.0);

        let (untouched, errors) = StickConfig::default().validated();
        assert!(errors.is_empty());
        assert_eq!(untouched, StickConfig::default());
    }
}
