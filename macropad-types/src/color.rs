use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A 24 bit RGB color
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(0xFF, 0xFF, 0xFF);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a color from json, either `[r, g, b]` or `0xRRGGBB` as an integer.
    ///
    /// Channels are clamped to `0..=255`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Array(channels) if channels.len() == 3 => {
                let mut rgb = [0u8; 3];
                for (slot, channel) in rgb.iter_mut().zip(channels) {
                    *slot = channel.as_f64()?.clamp(0.0, 255.0) as u8;
                }
                Some(Self::new(rgb[0], rgb[1], rgb[2]))
            }
            Value::Number(n) => {
                let v = n.as_u64()?.min(0xFF_FFFF) as u32;
                Some(Self::from(v))
            }
            _ => None,
        }
    }

    pub fn to_json(self) -> Value {
        Value::from([self.r, self.g, self.b].as_slice())
    }
}

impl From<u32> for Rgb {
    fn from(v: u32) -> Self {
        Self::new((v >> 16) as u8, (v >> 8) as u8, v as u8)
    }
}

impl From<Rgb> for u32 {
    fn from(c: Rgb) -> Self {
        ((c.r as u32) << 16) | ((c.g as u32) << 8) | c.b as u32
    }
}
