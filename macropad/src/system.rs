//! System calls reachable from macros (`{"sys": "<name>"}`) and the reset capability.

/// System call names accepted in macros
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SysCall {
    /// Create the USB marker file and hard reset, the next boot exposes the storage as a USB drive
    EnableUsb,
    SoftReset,
    HardReset,
    CloseGroup,
    GoToRoot,
    IncreaseBrightness,
    DecreaseBrightness,
    /// Unknown names are accepted and do nothing
    Unknown,
}

impl SysCall {
    pub fn parse(name: &str) -> Self {
        match name {
            "enable_usb" => SysCall::EnableUsb,
            "soft_reset" => SysCall::SoftReset,
            "hard_reset" => SysCall::HardReset,
            "close_group" => SysCall::CloseGroup,
            "go_to_root" => SysCall::GoToRoot,
            "increase_brightness" => SysCall::IncreaseBrightness,
            "decrease_brightness" => SysCall::DecreaseBrightness,
            _ => SysCall::Unknown,
        }
    }
}

/// Brightness step of the brightness system calls
pub const BRIGHTNESS_STEP: f64 = 0.1;

/// Next brightness after one step up or down, snapped to the step grid within `0.0..=1.0`
pub fn step_brightness(current: f64, increase: bool) -> f64 {
    let steps = round_half_away(current / BRIGHTNESS_STEP);
    let next = if increase { steps + 1.0 } else { steps - 1.0 };
    (next * BRIGHTNESS_STEP).clamp(0.0, 1.0)
}

// `f64::round` needs std
fn round_half_away(x: f64) -> f64 {
    if x >= 0.0 { (x + 0.5) as i64 as f64 } else { (x - 0.5) as i64 as f64 }
}

/// Board level controls which end the current firmware run
pub trait SystemControl {
    /// Restart the firmware without a full chip reset. Defaults to [`SystemControl::hard_reset`]
    fn soft_reset(&mut self) {
        self.hard_reset();
    }

    fn hard_reset(&mut self) {
        crate::boot::reboot();
    }

    /// Free heap in bytes, if the board can tell
    fn free_memory(&self) -> Option<usize> {
        None
    }

    /// Called while [`SystemControl::free_memory`] is below the configured limit, e.g. to drop caches
    fn reclaim_memory(&mut self) {}
}
