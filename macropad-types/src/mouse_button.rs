//! Mouse button state and operations.
//!
//! Supports up to 8 mouse buttons, matching the button byte of a HID mouse report.
use core::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

use bitfield_struct::bitfield;

use crate::upper_ascii;

/// Mouse buttons
#[bitfield(u8, order = Lsb, defmt = cfg(feature = "defmt"))]
#[derive(Eq, PartialEq)]
pub struct MouseButtons {
    #[bits(1)]
    pub button1: bool, //left
    #[bits(1)]
    pub button2: bool, //right
    #[bits(1)]
    pub button3: bool, //middle
    #[bits(1)]
    pub button4: bool,
    #[bits(1)]
    pub button5: bool,
    #[bits(1)]
    pub button6: bool,
    #[bits(1)]
    pub button7: bool,
    #[bits(1)]
    pub button8: bool,
}

impl BitOr for MouseButtons {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self::from_bits(self.into_bits() | rhs.into_bits())
    }
}
impl BitAnd for MouseButtons {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self::from_bits(self.into_bits() & rhs.into_bits())
    }
}
impl Not for MouseButtons {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self::from_bits(!self.into_bits())
    }
}
impl BitAndAssign for MouseButtons {
    fn bitand_assign(&mut self, rhs: Self) {
        *self = *self & rhs;
    }
}
impl BitOrAssign for MouseButtons {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

impl MouseButtons {
    pub const LEFT: Self = Self::new().with_button1(true);
    pub const RIGHT: Self = Self::new().with_button2(true);
    pub const MIDDLE: Self = Self::new().with_button3(true);
    pub const BACK: Self = Self::new().with_button4(true);
    pub const FORWARD: Self = Self::new().with_button5(true);

    /// Look up a button by its macro-file name: `LEFT`, `RIGHT`, `MIDDLE`, `BACK` or `FORWARD`.
    ///
    /// A trailing `_BUTTON` is accepted, so `LEFT_BUTTON` works too.
    pub fn from_name(name: &str) -> Option<Self> {
        let mut buf = [0u8; 16];
        let name = upper_ascii(name, &mut buf)?;
        let name = name.strip_suffix("_BUTTON").unwrap_or(name);
        match name {
            "LEFT" => Some(Self::LEFT),
            "RIGHT" => Some(Self::RIGHT),
            "MIDDLE" => Some(Self::MIDDLE),
            "BACK" => Some(Self::BACK),
            "FORWARD" => Some(Self::FORWARD),
            _ => None,
        }
    }

    pub fn is_empty(self) -> bool {
        self.into_bits() == 0
    }
}
