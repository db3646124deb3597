//! Shared data types of the mapping engine
//!
//! Layers, actions, trigger modes and repeat policies. Everything here is plain data
//! with structural equality; behavior lives in the engine.

use crate::mapping::keyboard::{chord_label, Key, Modifier};
use std::fmt;
use std::time::Duration;

pub use crate::controller::event_collector::{InputElement, StickId, TriggerId};

/// Element that switches the engine to the modifier layer while held
pub const MODIFIER_ELEMENT: InputElement = InputElement::LeftShoulder;

/// Mapping layer, used as an index into the binding table
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Layer {
    #[default]
    Base = 0,
    Modifier = 1,
}

impl Layer {
    pub const ALL: [Layer; 2] = [Layer::Base, Layer::Modifier];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Base => write!(f, "base"),
            Layer::Modifier => write!(f, "modifier"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
}

impl MouseButton {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "left" => Some(MouseButton::Left),
            "right" => Some(MouseButton::Right),
            _ => None,
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MouseButton::Left => write!(f, "left"),
            MouseButton::Right => write!(f, "right"),
        }
    }
}

/// What a binding does when it fires
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// Key press and release with the given modifiers held
    Keystroke { key: Key, modifiers: Vec<Modifier> },

    /// Keystroke whose `sticky_modifiers` stay held after it is posted
    ///
    /// They are released when the modifier layer ends, when the engine stops, or
    /// when a non-sticky action fires.
    StickyKeystroke {
        key: Key,
        modifiers: Vec<Modifier>,
        sticky_modifiers: Vec<Modifier>,
    },

    TypeText(String),

    /// Paste whose shortcut depends on the clipboard content at fire time
    SmartPaste,

    MouseClick(MouseButton),
}

impl Action {
    pub fn keystroke(key: Key, modifiers: &[Modifier]) -> Self {
        Action::Keystroke {
            key,
            modifiers: modifiers.to_vec(),
        }
    }

    pub fn is_sticky(&self) -> bool {
        matches!(self, Action::StickyKeystroke { .. })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Keystroke { key, modifiers } => {
                write!(f, "keystroke {}", chord_label(*key, modifiers))
            }
            Action::StickyKeystroke {
                key,
                modifiers,
                sticky_modifiers,
            } => {
                let sticky: Vec<&str> = sticky_modifiers.iter().map(|m| m.name()).collect();
                write!(
                    f,
                    "sticky keystroke {} (holding {})",
                    chord_label(*key, modifiers),
                    sticky.join("+")
                )
            }
            Action::TypeText(text) => write!(f, "type {:?}", text),
            Action::SmartPaste => write!(f, "smart paste"),
            Action::MouseClick(button) => write!(f, "{} click", button),
        }
    }
}

/// Which edges of a button fire its action
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TriggerMode {
    #[default]
    OnPress,
    OnRelease,
    OnPressAndRelease,
}

impl TriggerMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "on_press" => Some(TriggerMode::OnPress),
            "on_release" => Some(TriggerMode::OnRelease),
            "on_press_and_release" => Some(TriggerMode::OnPressAndRelease),
            _ => None,
        }
    }

    pub fn should_fire(self, pressed: bool) -> bool {
        match self {
            TriggerMode::OnPress => pressed,
            TriggerMode::OnRelease => !pressed,
            TriggerMode::OnPressAndRelease => true,
        }
    }
}

impl fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerMode::OnPress => write!(f, "on_press"),
            TriggerMode::OnRelease => write!(f, "on_release"),
            TriggerMode::OnPressAndRelease => write!(f, "on_press_and_release"),
        }
    }
}

/// Hold-to-repeat timing: first repeat after `initial_delay`, then every `interval`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RepeatPolicy {
    pub initial_delay: Duration,
    pub interval: Duration,
}

impl RepeatPolicy {
    /// Builds a policy from seconds, rejecting negative, non-finite and zero-interval values
    pub fn from_secs(delay: f64, interval: f64) -> Option<Self> {
        if !(delay.is_finite() && interval.is_finite()) || delay < 0.0 || interval <= 0.0 {
            return None;
        }
        Some(Self {
            initial_delay: Duration::try_from_secs_f64(delay).ok()?,
            interval: Duration::try_from_secs_f64(interval).ok()?,
        })
    }

    pub const fn from_millis(delay_ms: u64, interval_ms: u64) -> Self {
        Self {
            initial_delay: Duration::from_millis(delay_ms),
            interval: Duration::from_millis(interval_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_modes_select_edges() {
        assert!(TriggerMode::OnPress.should_fire(true));
        assert!(!TriggerMode::OnPress.should_fire(false));
        assert!(!TriggerMode::OnRelease.should_fire(true));
        assert!(TriggerMode::OnRelease.should_fire(false));
        assert!(TriggerMode::OnPressAndRelease.should_fire(true));
        assert!(TriggerMode::OnPressAndRelease.should_fire(false));
        assert_eq!(TriggerMode::default(), TriggerMode::OnPress);
    }

    #[test]
    fn repeat_policy_rejects_bad_values() {
        assert!(RepeatPolicy::from_secs(0.4, 0.0).is_none());
        assert!(RepeatPolicy::from_secs(-0.1, 0.02).is_none());
        assert!(RepeatPolicy::from_secs(f64::NAN, 0.02).is_none());
        assert_eq!(
            RepeatPolicy::from_secs(0.4, 0.02),
            Some(RepeatPolicy::from_millis(400, 20))
        );
    }

    #[test]
    fn actions_compare_structurally() {
        let c = Key::from_name("c").expect("known key");
        assert_eq!(
            Action::keystroke(c, &[Modifier::Control]),
            Action::Keystroke {
                key: c,
                modifiers: vec![Modifier::Control]
            }
        );
        assert_ne!(
            Action::keystroke(c, &[Modifier::Control]),
            Action::keystroke(c, &[Modifier::Command])
        );
    }
}
