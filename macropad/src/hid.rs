//! HID capabilities used by macros, and a report level implementation of them.
use core::fmt;

use macropad_types::keycode::{ConsumerKey, HidKeyCode};
use macropad_types::layout::KeyboardLayout;
use macropad_types::modifier::HidModifiers;
use macropad_types::mouse_button::MouseButtons;
use usbd_hid::descriptor::{KeyboardReport, MediaKeyboardReport, MouseReport};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HidError {
    /// The host hasn't configured the interface yet
    UsbDisabled,
    UsbEndpointError,
    BufferOverflow,
    ReportSerializeError,
    /// Audio file missing or unsupported
    FileNotFound,
}

impl fmt::Display for HidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            HidError::UsbDisabled => "usb is disabled",
            HidError::UsbEndpointError => "usb endpoint error",
            HidError::BufferOverflow => "buffer overflow",
            HidError::ReportSerializeError => "report serialize error",
            HidError::FileNotFound => "file not found",
        };
        f.write_str(msg)
    }
}

pub trait KeyboardHid {
    fn press_key(&mut self, key: HidKeyCode);

    fn release_key(&mut self, key: HidKeyCode);

    fn release_all_keys(&mut self);

    /// Type `text` as it reads on the host's `layout`, characters without a key are skipped
    fn write_text(&mut self, text: &str, layout: KeyboardLayout) {
        for c in text.bytes() {
            let (key, shifted) = layout.keycode(c);
            if key == HidKeyCode::No {
                debug!("No key for character {}", c);
                continue;
            }
            if shifted {
                self.press_key(HidKeyCode::LShift);
            }
            self.press_key(key);
            self.release_key(key);
            if shifted {
                self.release_key(HidKeyCode::LShift);
            }
        }
    }
}

pub trait ConsumerHid {
    fn press_consumer(&mut self, key: ConsumerKey);

    /// Release the held consumer control
    fn release_consumer(&mut self);
}

pub trait MouseHid {
    fn click(&mut self, buttons: MouseButtons);

    fn move_by(&mut self, x: i32, y: i32, wheel: i32);

    fn release_all_buttons(&mut self);
}

pub trait Audio {
    fn start_tone(&mut self, frequency: u32);

    fn stop_tone(&mut self);

    fn play_file(&mut self, path: &str) -> Result<(), HidError>;
}

pub trait Midi {
    fn note_on(&mut self, note: u8, velocity: u8);

    fn note_off(&mut self, note: u8, velocity: u8);

    /// 14 bit bend, `8192` is centered
    fn pitch_bend(&mut self, value: u16);

    fn control_change(&mut self, control: u8, value: u8);

    fn program_change(&mut self, program: u8);
}

/// Every output a macro can drive
pub trait HidOutput: KeyboardHid + ConsumerHid + MouseHid + Audio + Midi {}

impl<T: KeyboardHid + ConsumerHid + MouseHid + Audio + Midi> HidOutput for T {}

pub enum Report {
    /// Normal keyboard hid report
    KeyboardReport(KeyboardReport),
    /// Mouse hid report
    MouseReport(MouseReport),
    /// Media keyboard report
    MediaKeyboardReport(MediaKeyboardReport),
}

/// Sends finished reports to the host, e.g. over a USB HID endpoint
pub trait ReportWriter {
    fn write_report(&mut self, report: Report) -> Result<(), HidError>;
}

/// Implements the keyboard, consumer and mouse capabilities by keeping the state of the HID reports and
/// writing a report on every change.
pub struct HidReporter<W: ReportWriter> {
    writer: W,
    held_modifiers: HidModifiers,
    held_keycodes: [HidKeyCode; 6],
    buttons: MouseButtons,
    media_usage: u16,
}

impl<W: ReportWriter> HidReporter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            held_modifiers: HidModifiers::default(),
            held_keycodes: [HidKeyCode::No; 6],
            buttons: MouseButtons::default(),
            media_usage: 0,
        }
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.writer
    }

    fn send(&mut self, report: Report) {
        if let Err(e) = self.writer.write_report(report) {
            warn!("Failed to send report: {:?}", e);
        }
    }

    fn send_keyboard_report(&mut self) {
        self.send(Report::KeyboardReport(KeyboardReport {
            modifier: self.held_modifiers.into_bits(),
            reserved: 0,
            leds: 0,
            keycodes: self.held_keycodes.map(|k| k as u8),
        }));
    }

    fn send_mouse_report(&mut self, x: i8, y: i8, wheel: i8) {
        self.send(Report::MouseReport(MouseReport {
            buttons: self.buttons.into_bits(),
            x,
            y,
            wheel,
            pan: 0,
        }));
    }
}

impl<W: ReportWriter> KeyboardHid for HidReporter<W> {
    fn press_key(&mut self, key: HidKeyCode) {
        if key.is_modifier() {
            self.held_modifiers |= key.to_hid_modifiers();
        } else if !self.held_keycodes.contains(&key) {
            match self.held_keycodes.iter().position(|&k| k == HidKeyCode::No) {
                Some(index) => self.held_keycodes[index] = key,
                None => {
                    warn!("Too many keys held, {:?} dropped", key);
                    return;
                }
            }
        }
        self.send_keyboard_report();
    }

    fn release_key(&mut self, key: HidKeyCode) {
        if key.is_modifier() {
            self.held_modifiers &= !key.to_hid_modifiers();
        } else if let Some(index) = self.held_keycodes.iter().position(|&k| k == key) {
            self.held_keycodes[index] = HidKeyCode::No;
        }
        self.send_keyboard_report();
    }

    fn release_all_keys(&mut self) {
        self.held_modifiers = HidModifiers::default();
        self.held_keycodes = [HidKeyCode::No; 6];
        self.send_keyboard_report();
    }
}

impl<W: ReportWriter> ConsumerHid for HidReporter<W> {
    fn press_consumer(&mut self, key: ConsumerKey) {
        self.media_usage = key as u16;
        self.send(Report::MediaKeyboardReport(MediaKeyboardReport {
            usage_id: self.media_usage,
        }));
    }

    fn release_consumer(&mut self) {
        self.media_usage = 0;
        self.send(Report::MediaKeyboardReport(MediaKeyboardReport { usage_id: 0 }));
    }
}

impl<W: ReportWriter> MouseHid for HidReporter<W> {
    fn click(&mut self, buttons: MouseButtons) {
        self.buttons |= buttons;
        self.send_mouse_report(0, 0, 0);
        self.buttons &= !buttons;
        self.send_mouse_report(0, 0, 0);
    }

    /// Large moves are split into several reports, each axis of a report is limited to `-127..=127`
    fn move_by(&mut self, mut x: i32, mut y: i32, mut wheel: i32) {
        let step = |v: &mut i32| {
            let s = (*v).clamp(-127, 127);
            *v -= s;
            s as i8
        };
        while x != 0 || y != 0 || wheel != 0 {
            let (dx, dy, dw) = (step(&mut x), step(&mut y), step(&mut wheel));
            self.send_mouse_report(dx, dy, dw);
        }
    }

    fn release_all_buttons(&mut self) {
        self.buttons = MouseButtons::default();
        self.send_mouse_report(0, 0, 0);
    }
}
