//! Visual state and bound action of one physical key.
use alloc::string::String;

use embassy_time::{Duration, Instant};
use macropad_types::color::Rgb;

use crate::display::{Display, LabelStyle, Pixels};
use crate::navigation::BoundAction;
use crate::node::NodeKind;

/// Width of a key label in characters
pub const LABEL_WIDTH: usize = 6;

/// Center `label` within [`LABEL_WIDTH`] characters, or cut it to that width
pub fn format_label(label: &str) -> String {
    let len = label.chars().count();
    if len > LABEL_WIDTH {
        return label.chars().take(LABEL_WIDTH).collect();
    }
    let left = (LABEL_WIDTH - len) / 2;
    let right = LABEL_WIDTH - len - left;
    let mut out = String::with_capacity(LABEL_WIDTH + label.len() - len);
    out.extend(core::iter::repeat_n(' ', left));
    out.push_str(label);
    out.extend(core::iter::repeat_n(' ', right));
    out
}

#[derive(Clone, Debug)]
pub struct KeyIndicator {
    index: usize,
    /// `None` while the key has nothing bound
    kind: Option<NodeKind>,
    label: String,
    color: Rgb,
    retrigger: bool,
    action: Option<BoundAction>,
    pressed: bool,
    /// Last time the action fired while the key is held
    last_fired: Option<Instant>,
}

impl KeyIndicator {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            kind: None,
            label: String::new(),
            color: Rgb::BLACK,
            retrigger: false,
            action: None,
            pressed: false,
            last_fired: None,
        }
    }

    pub fn set(&mut self, kind: NodeKind, label: &str, color: Rgb, retrigger: bool, action: Option<BoundAction>) {
        self.kind = Some(kind);
        self.label = if kind == NodeKind::Blank {
            String::new()
        } else {
            format_label(label)
        };
        self.color = color;
        self.retrigger = retrigger;
        self.action = action;
    }

    /// Unbind the key. The pressed state is kept, so the release of a held key still restores its LED
    pub fn clear(&mut self) {
        self.kind = None;
        self.label.clear();
        self.color = Rgb::BLACK;
        self.retrigger = false;
        self.action = None;
        self.last_fired = None;
    }

    pub fn style(&self, invert: bool) -> LabelStyle {
        let style = match self.kind {
            Some(NodeKind::Macro) => LabelStyle::INVERTED,
            _ => LabelStyle::NEUTRAL,
        };
        if invert { style.swapped() } else { style }
    }

    /// Draw the label and set the LED. The caller shows the pixels once all keys are updated
    pub fn update_visual<D: Display + Pixels + ?Sized>(&self, invert: bool, device: &mut D) {
        device.set_key_label(self.index, &self.label, self.style(invert));
        device.set_pixel(self.index, if self.pressed && self.action.is_some() { Rgb::WHITE } else { self.color });
    }

    /// The key went down. Flashes the LED white if something is bound and returns the action to run
    pub fn press<P: Pixels + ?Sized>(&mut self, now: Instant, pixels: &mut P) -> Option<BoundAction> {
        self.pressed = true;
        self.last_fired = Some(now);
        let action = self.action.clone()?;
        pixels.set_pixel(self.index, Rgb::WHITE);
        pixels.show();
        Some(action)
    }

    /// The key went up, restores the LED color
    pub fn release<P: Pixels + ?Sized>(&mut self, pixels: &mut P) {
        self.pressed = false;
        self.last_fired = None;
        pixels.set_pixel(self.index, self.color);
        pixels.show();
    }

    pub fn has_callback(&self) -> bool {
        self.action.is_some()
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn action(&self) -> Option<&BoundAction> {
        self.action.as_ref()
    }

    pub fn kind(&self) -> Option<NodeKind> {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    /// Held long enough since the last firing to fire again
    pub fn retrigger_due(&self, now: Instant, threshold: Duration) -> bool {
        if !(self.retrigger && self.pressed && self.action.is_some()) {
            return false;
        }
        self.last_fired
            .is_some_and(|fired| now.saturating_duration_since(fired) >= threshold)
    }

    /// Record a retrigger firing, returns the action to run
    pub fn mark_fired(&mut self, now: Instant) -> Option<BoundAction> {
        self.last_fired = Some(now);
        self.action.clone()
    }
}
