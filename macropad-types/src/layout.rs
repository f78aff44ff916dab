//! Keyboard layouts the host can be set to, and typing ascii text on them.
use serde::{Deserialize, Serialize};

use crate::keycode::{HidKeyCode, from_ascii};

/// Keyboard layout the host expects, used when typing text
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "lowercase")]
pub enum KeyboardLayout {
    Br,
    Cz,
    Da,
    De,
    Es,
    Fr,
    Hu,
    It,
    Po,
    Sw,
    Tr,
    Uk,
    #[default]
    Us,
}

impl KeyboardLayout {
    pub fn from_code(code: &str) -> Option<Self> {
        let layout = match code {
            "br" => Self::Br,
            "cz" => Self::Cz,
            "da" => Self::Da,
            "de" => Self::De,
            "es" => Self::Es,
            "fr" => Self::Fr,
            "hu" => Self::Hu,
            "it" => Self::It,
            "po" => Self::Po,
            "sw" => Self::Sw,
            "tr" => Self::Tr,
            "uk" => Self::Uk,
            "us" => Self::Us,
            _ => return None,
        };
        Some(layout)
    }

    /// Key typing the ascii char `ascii` on this layout, the bool is `true` if shift has to be held.
    ///
    /// Layouts other than us and uk only type letters, digits and whitespace/control chars.
    /// Anything else maps to `HidKeyCode::No`.
    pub fn keycode(self, ascii: u8) -> (HidKeyCode, bool) {
        match self {
            Self::Us => from_ascii(ascii),
            Self::Uk => match ascii {
                b'"' => (HidKeyCode::Kc2, true),
                b'@' => (HidKeyCode::Quote, true),
                b'#' => (HidKeyCode::NonusHash, false),
                b'~' => (HidKeyCode::NonusHash, true),
                b'\\' => (HidKeyCode::NonusBackslash, false),
                b'|' => (HidKeyCode::NonusBackslash, true),
                _ => from_ascii(ascii),
            },
            _ => self.base_keycode(ascii),
        }
    }

    fn base_keycode(self, ascii: u8) -> (HidKeyCode, bool) {
        let (key, shifted) = from_ascii(ascii);
        let key = match (self, key) {
            // Qwertz
            (Self::De | Self::Cz | Self::Hu, HidKeyCode::Y) => HidKeyCode::Z,
            (Self::De | Self::Cz | Self::Hu, HidKeyCode::Z) => HidKeyCode::Y,
            // Azerty
            (Self::Fr, HidKeyCode::A) => HidKeyCode::Q,
            (Self::Fr, HidKeyCode::Q) => HidKeyCode::A,
            (Self::Fr, HidKeyCode::Z) => HidKeyCode::W,
            (Self::Fr, HidKeyCode::W) => HidKeyCode::Z,
            (Self::Fr, HidKeyCode::M) => HidKeyCode::Semicolon,
            (Self::Hu, HidKeyCode::Kc0) if !shifted => HidKeyCode::Grave,
            _ => key,
        };
        match ascii {
            b'a'..=b'z' | b'A'..=b'Z' => {
                // Dotted `i` has its own key on the turkish layout, the `I` key types a dotless one
                if self == Self::Tr && ascii == b'i' {
                    return (HidKeyCode::Quote, false);
                }
                (key, shifted)
            }
            // The number row types accented letters unless shifted
            b'0'..=b'9' if matches!(self, Self::Fr | Self::Cz) => (key, true),
            b'0'..=b'9' | b' ' | b'\n' | b'\t' | b'\x08' | b'\x1B' | b'\x7F' => (key, shifted),
            _ => (HidKeyCode::No, false),
        }
    }
}
