//! Display and key LED capabilities.
use macropad_types::color::Rgb;

/// Colors of a key label on the display
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LabelStyle {
    pub background: Rgb,
    pub text: Rgb,
}

impl LabelStyle {
    /// White text on black, used by blank keys and groups
    pub const NEUTRAL: LabelStyle = LabelStyle {
        background: Rgb::BLACK,
        text: Rgb::WHITE,
    };
    /// Black text on white, used by macros
    pub const INVERTED: LabelStyle = LabelStyle {
        background: Rgb::WHITE,
        text: Rgb::BLACK,
    };

    pub fn swapped(self) -> Self {
        Self {
            background: self.text,
            text: self.background,
        }
    }
}

pub trait Display {
    /// Draw the label of key `index`
    fn set_key_label(&mut self, index: usize, text: &str, style: LabelStyle);

    /// Draw the title line, usually the name of the open group
    fn set_title(&mut self, text: &str);

    fn set_sleep(&mut self, sleep: bool);

    fn is_sleeping(&self) -> bool;

    /// `0.0..=1.0`
    fn set_brightness(&mut self, brightness: f64);

    /// Push pending changes to the panel, called once per loop iteration
    fn refresh(&mut self);
}

/// One RGB LED per key
pub trait Pixels {
    fn set_pixel(&mut self, index: usize, color: Rgb);

    /// `0.0..=1.0`
    fn set_pixel_brightness(&mut self, brightness: f64);

    fn show(&mut self);
}
