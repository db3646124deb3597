//! Key and modifier vocabulary
//!
//! Keys are identified by their configuration name and carry the virtual key code a
//! platform sink posts for them. The table is the single source of truth for which
//! names a binding may use.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! key_table {
    ($($name:literal => $code:literal),* $(,)?) => {
        &[$(($name, $code)),*]
    };
}

static KEY_TABLE: &[(&str, u16)] = key_table! {
    // Letters
    "a" => 0x00, "b" => 0x0B, "c" => 0x08, "d" => 0x02, "e" => 0x0E,
    "f" => 0x03, "g" => 0x05, "h" => 0x04, "i" => 0x22, "j" => 0x26,
    "k" => 0x28, "l" => 0x25, "m" => 0x2E, "n" => 0x2D, "o" => 0x1F,
    "p" => 0x23, "q" => 0x0C, "r" => 0x0F, "s" => 0x01, "t" => 0x11,
    "u" => 0x20, "v" => 0x09, "w" => 0x0D, "x" => 0x07, "y" => 0x10,
    "z" => 0x06,
    // Digits
    "0" => 0x1D, "1" => 0x12, "2" => 0x13, "3" => 0x14, "4" => 0x15,
    "5" => 0x17, "6" => 0x16, "7" => 0x1A, "8" => 0x1C, "9" => 0x19,
    // Editing
    "return" => 0x24,
    "escape" => 0x35,
    "space" => 0x31,
    "tab" => 0x30,
    "delete" => 0x33,
    "forward_delete" => 0x75,
    // Arrows
    "up_arrow" => 0x7E,
    "down_arrow" => 0x7D,
    "left_arrow" => 0x7B,
    "right_arrow" => 0x7C,
    // Punctuation
    "grave" => 0x32,
    "minus" => 0x1B,
    "equal" => 0x18,
    "left_bracket" => 0x21,
    "right_bracket" => 0x1E,
    "backslash" => 0x2A,
    "semicolon" => 0x29,
    "quote" => 0x27,
    "comma" => 0x2B,
    "period" => 0x2F,
    "slash" => 0x2C,
    // Function keys
    "f1" => 0x7A, "f2" => 0x78, "f3" => 0x63, "f4" => 0x76,
    "f5" => 0x60, "f6" => 0x61, "f7" => 0x62, "f8" => 0x64,
    "f9" => 0x65, "f10" => 0x6D, "f11" => 0x67, "f12" => 0x6F,
};

/// A named keyboard key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Key {
    name: &'static str,
    code: u16,
}

impl Key {
    /// Looks a key up by its configuration name
    pub fn from_name(name: &str) -> Option<Self> {
        KEY_TABLE
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|&(name, code)| Key { name, code })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Virtual key code posted by platform sinks
    pub fn code(&self) -> u16 {
        self.code
    }

    /// All known keys in table order
    pub fn all() -> impl Iterator<Item = Key> {
        KEY_TABLE.iter().map(|&(name, code)| Key { name, code })
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// Keys used by the engine itself; present in KEY_TABLE by construction.
pub(crate) fn builtin_key(name: &'static str) -> Key {
    Key::from_name(name).unwrap_or(Key { name, code: 0 })
}

/// Keyboard modifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    Command,
    Shift,
    Option,
    Control,
}

impl Modifier {
    pub const ALL: [Modifier; 4] = [
        Modifier::Command,
        Modifier::Shift,
        Modifier::Option,
        Modifier::Control,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Modifier::Command => "command",
            Modifier::Shift => "shift",
            Modifier::Option => "option",
            Modifier::Control => "control",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    /// Virtual key code of the left-hand modifier key
    pub fn code(self) -> u16 {
        match self {
            Modifier::Command => 0x37,
            Modifier::Shift => 0x38,
            Modifier::Option => 0x3A,
            Modifier::Control => 0x3B,
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Joins modifiers and key the way shortcuts are usually written, e.g. `command+shift+left_bracket`
pub fn chord_label(key: Key, modifiers: &[Modifier]) -> String {
    let mut parts: Vec<&str> = modifiers.iter().map(|m| m.name()).collect();
    parts.push(key.name());
    parts.join("+")
}

/// Decomposes text into the keystrokes that type it.
///
/// Newlines become `return`; characters without a key of their own are skipped.
/// Platform sinks without a unicode injection path use this for `TypeText`.
pub fn keystrokes_for_text(text: &str) -> Vec<Key> {
    text.chars()
        .filter_map(|ch| {
            let name = match ch {
                '\n' => "return",
                '/' => "slash",
                ' ' => "space",
                '\t' => "tab",
                '`' => "grave",
                '-' => "minus",
                '=' => "equal",
                '[' => "left_bracket",
                ']' => "right_bracket",
                '\\' => "backslash",
                ';' => "semicolon",
                '\'' => "quote",
                ',' => "comma",
                '.' => "period",
                other => {
                    let mut buf = [0u8; 4];
                    return Key::from_name(other.encode_utf8(&mut buf));
                }
            };
            Key::from_name(name)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_no_duplicate_names() {
        let mut names: Vec<&str> = Key::all().map(|k| k.name()).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
        assert_eq!(total, 26 + 10 + 6 + 4 + 11 + 12);
    }

    #[test]
    fn lookup_by_name() {
        let key = Key::from_name("left_bracket").expect("known key");
        assert_eq!(key.code(), 0x21);
        assert!(Key::from_name("leftBracket").is_none());
        assert!(Key::from_name("").is_none());
    }

    #[test]
    fn modifiers_round_trip() {
        for modifier in Modifier::ALL {
            assert_eq!(Modifier::from_name(modifier.name()), Some(modifier));
        }
        assert_eq!(Modifier::from_name("hyper"), None);
    }

    #[test]
    fn text_decomposition_skips_unmapped_characters() {
        let names: Vec<&str> = keystrokes_for_text("/clear\nA!")
            .into_iter()
            .map(|k| k.name())
            .collect();
        assert_eq!(names, vec!["slash", "c", "l", "e", "a", "r", "return"]);
    }

    #[test]
    fn chord_label_lists_modifiers_first() {
        let key = builtin_key("c");
        assert_eq!(chord_label(key, &[Modifier::Control]), "control+c");
        assert_eq!(chord_label(key, &[]), "c");
    }
}
