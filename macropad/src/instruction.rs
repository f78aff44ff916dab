//! Macro instructions and their json encoding.
//!
//! A macro's `content` is a json array, each element is one of:
//!
//! | json | instruction |
//! |---|---|
//! | number | [`Instruction::Delay`] in seconds |
//! | string | [`Instruction::TypeText`] |
//! | `{"kc": "CONTROL,C"}` | [`Instruction::KeyCode`], `+` prefix taps, `-` prefix only releases, `RELALL` releases everything |
//! | `{"ccc": "+MUTE"}` | [`Instruction::ConsumerCode`], same prefixes as `kc` |
//! | `{"mse": {"x": 10, "y": 0, "w": 0, "b": "LEFT"}}` | [`Instruction::MouseMove`] |
//! | `{"tone": {"frequency": 440, "duration": 0.2}}` | [`Instruction::Tone`] |
//! | `{"file": "beep.wav"}` | [`Instruction::PlayFile`] |
//! | `{"mid": {"ntn": "60,64", "vel": 100, "dur": 0.5, "pb": "+512", "cc": [7, 100], "pc": 3}}` | [`Instruction::Midi`] |
//! | `{"sys": "go_to_root"}` | [`Instruction::SysCall`] |
//!
//! An object may hold several of these keys, they expand to several instructions in the order
//! `kc`, `ccc`, `tone`, `file`, `mid`, `mse`, `sys`. Everything else becomes [`Instruction::Unknown`].
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use heapless::Vec as HVec;
use macropad_types::keycode::{ConsumerKey, HidKeyCode};
use macropad_types::mouse_button::MouseButtons;
use serde_json::{Map, Value};

use crate::system::SysCall;

/// Max number of key codes in one chord
pub const MAX_CHORD_SIZE: usize = 8;
/// Max number of notes in one midi instruction
pub const MAX_NOTES: usize = 8;
/// Highest 14 bit pitch bend value, the center is 8192
pub const PITCH_BEND_MAX: u16 = 16383;

/// How a key or consumer code is sent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PressMode {
    /// No prefix: pressed with the key, released when the key is released
    Press,
    /// `+` prefix: pressed and released right away
    Tap,
    /// `-` prefix: only released, when the key is released
    Release,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    /// Wait this many seconds before the rest of the sequence. Negative values are the explicit form of the same
    Delay(f64),
    TypeText(String),
    KeyCode {
        mode: PressMode,
        codes: HVec<HidKeyCode, MAX_CHORD_SIZE>,
    },
    /// `{"kc": "RELALL"}`
    ReleaseAll,
    ConsumerCode {
        mode: PressMode,
        code: ConsumerKey,
    },
    MouseMove {
        x: i32,
        y: i32,
        wheel: i32,
        button: Option<MouseButtons>,
    },
    /// `duration == 0` keeps the tone on while the key is held
    Tone {
        frequency: u32,
        duration: f64,
    },
    PlayFile(String),
    Midi(MidiStep),
    SysCall(SysCall),
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PitchBend {
    Set(u16),
    Increment(u16),
    Decrement(u16),
}

impl PitchBend {
    /// Apply to the current bend, clamped to `0..=PITCH_BEND_MAX`
    pub fn apply(self, current: u16) -> u16 {
        match self {
            PitchBend::Set(v) => v.min(PITCH_BEND_MAX),
            PitchBend::Increment(d) => current.saturating_add(d).min(PITCH_BEND_MAX),
            PitchBend::Decrement(d) => current.saturating_sub(d),
        }
    }
}

/// One `{"mid": {...}}` instruction, every part is optional
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MidiStep {
    /// `ntn`: notes switched on
    pub notes_on: HVec<u8, MAX_NOTES>,
    /// `ntf`: notes switched off
    pub notes_off: HVec<u8, MAX_NOTES>,
    /// `vel`, defaults to 127
    pub velocity: u8,
    /// `dur` in seconds, `0` holds the notes until the key is released
    pub duration: f64,
    /// `pb`
    pub pitch_bend: Option<PitchBend>,
    /// `cc`: `[control, value]`
    pub control_change: Option<(u8, u8)>,
    /// `pc`
    pub program_change: Option<u8>,
}

impl MidiStep {
    pub fn from_json(object: &Map<String, Value>) -> Self {
        let mut step = MidiStep {
            velocity: 127,
            ..Default::default()
        };
        if let Some(notes) = object.get("ntn") {
            step.notes_on = parse_notes(notes);
        }
        if let Some(notes) = object.get("ntf") {
            step.notes_off = parse_notes(notes);
        }
        if let Some(velocity) = object.get("vel").and_then(Value::as_f64) {
            step.velocity = clamp_7bit(velocity);
        }
        if let Some(duration) = object.get("dur").and_then(Value::as_f64) {
            step.duration = duration.max(0.0);
        }
        step.pitch_bend = object.get("pb").and_then(parse_pitch_bend);
        step.control_change = object.get("cc").and_then(|cc| match cc.as_array()?.as_slice() {
            [control, value] => Some((clamp_7bit(control.as_f64()?), clamp_7bit(value.as_f64()?))),
            _ => None,
        });
        step.program_change = object.get("pc").and_then(Value::as_f64).map(clamp_7bit);
        step
    }

    pub fn is_empty(&self) -> bool {
        self.notes_on.is_empty()
            && self.notes_off.is_empty()
            && self.pitch_bend.is_none()
            && self.control_change.is_none()
            && self.program_change.is_none()
    }
}

fn clamp_7bit(v: f64) -> u8 {
    v.clamp(0.0, 127.0) as u8
}

/// Notes as `"60,64"`, a single number or an array. Malformed or out of range notes are skipped
fn parse_notes(value: &Value) -> HVec<u8, MAX_NOTES> {
    let mut notes = HVec::new();
    let mut push = |note: Option<i64>| match note {
        Some(n @ 0..=127) => {
            if notes.push(n as u8).is_err() {
                debug!("Too many midi notes, dropping {}", n);
            }
        }
        _ => debug!("Invalid midi note skipped"),
    };
    match value {
        Value::String(s) => s.split(',').for_each(|n| push(n.trim().parse().ok())),
        Value::Number(n) => push(n.as_i64()),
        Value::Array(items) => items.iter().for_each(|n| push(n.as_i64())),
        _ => debug!("Invalid midi notes skipped"),
    }
    notes
}

fn parse_pitch_bend(value: &Value) -> Option<PitchBend> {
    let clamp = |v: i64| v.clamp(0, PITCH_BEND_MAX as i64) as u16;
    match value {
        Value::Number(n) => Some(PitchBend::Set(clamp(n.as_f64()? as i64))),
        Value::String(s) => {
            let s = s.trim();
            if let Some(delta) = s.strip_prefix('+') {
                Some(PitchBend::Increment(clamp(delta.trim().parse().ok()?)))
            } else if let Some(delta) = s.strip_prefix('-') {
                Some(PitchBend::Decrement(clamp(delta.trim().parse().ok()?)))
            } else {
                Some(PitchBend::Set(clamp(s.parse().ok()?)))
            }
        }
        _ => None,
    }
}

fn split_mode(field: &str) -> (PressMode, &str) {
    let field = field.trim();
    if let Some(rest) = field.strip_prefix('+') {
        (PressMode::Tap, rest)
    } else if let Some(rest) = field.strip_prefix('-') {
        (PressMode::Release, rest)
    } else {
        (PressMode::Press, field)
    }
}

impl Instruction {
    /// Parse a macro's `content` array. Anything but an array is an empty sequence
    pub fn parse_sequence(content: &Value) -> Vec<Instruction> {
        let mut instructions = Vec::new();
        if let Some(items) = content.as_array() {
            for item in items {
                Self::parse_into(item, &mut instructions);
            }
        }
        instructions
    }

    /// Parse one json element, pushing one instruction (or several for a multi-key object)
    pub fn parse_into(value: &Value, out: &mut Vec<Instruction>) {
        match value {
            Value::Number(n) => out.push(n.as_f64().map_or(Instruction::Unknown, Instruction::Delay)),
            Value::String(text) => out.push(Instruction::TypeText(text.clone())),
            Value::Object(object) => {
                let before = out.len();
                if let Some(kc) = object.get("kc") {
                    out.push(parse_key_codes(kc));
                }
                if let Some(ccc) = object.get("ccc") {
                    out.push(parse_consumer_code(ccc));
                }
                if let Some(tone) = object.get("tone") {
                    out.push(parse_tone(tone));
                }
                if let Some(file) = object.get("file") {
                    out.push(match file.as_str() {
                        Some(path) => Instruction::PlayFile(path.to_string()),
                        None => Instruction::Unknown,
                    });
                }
                if let Some(midi) = object.get("mid") {
                    out.push(match midi.as_object().map(MidiStep::from_json) {
                        Some(step) if !step.is_empty() => Instruction::Midi(step),
                        _ => Instruction::Unknown,
                    });
                }
                if let Some(mouse) = object.get("mse") {
                    out.push(parse_mouse(mouse));
                }
                if let Some(sys) = object.get("sys") {
                    out.push(match sys.as_str() {
                        Some(name) => Instruction::SysCall(SysCall::parse(name)),
                        None => Instruction::Unknown,
                    });
                }
                if out.len() == before {
                    out.push(Instruction::Unknown);
                }
            }
            _ => out.push(Instruction::Unknown),
        }
    }
}

fn parse_key_codes(value: &Value) -> Instruction {
    let Some(field) = value.as_str() else {
        return Instruction::Unknown;
    };
    let (mode, names) = split_mode(field);
    if names.trim().eq_ignore_ascii_case("RELALL") {
        return Instruction::ReleaseAll;
    }
    let mut codes = HVec::new();
    for name in names.split(',') {
        match HidKeyCode::from_name(name) {
            Some(code) => {
                if !codes.contains(&code) && codes.push(code).is_err() {
                    debug!("Chord is too long, dropping {}", name);
                }
            }
            None => debug!("Unknown key code {}", name),
        }
    }
    if codes.is_empty() {
        Instruction::Unknown
    } else {
        Instruction::KeyCode { mode, codes }
    }
}

fn parse_consumer_code(value: &Value) -> Instruction {
    let Some(field) = value.as_str() else {
        return Instruction::Unknown;
    };
    let (mode, name) = split_mode(field);
    match ConsumerKey::from_name(name) {
        Some(code) => Instruction::ConsumerCode { mode, code },
        None => {
            debug!("Unknown consumer code {}", name);
            Instruction::Unknown
        }
    }
}

fn parse_tone(value: &Value) -> Instruction {
    let frequency = value.get("frequency").and_then(Value::as_f64).filter(|f| *f > 0.0);
    let duration = value.get("duration").and_then(Value::as_f64).unwrap_or(0.0);
    match frequency {
        Some(frequency) => Instruction::Tone {
            frequency: frequency as u32,
            duration: duration.max(0.0),
        },
        None => Instruction::Unknown,
    }
}

fn parse_mouse(value: &Value) -> Instruction {
    let Some(object) = value.as_object() else {
        return Instruction::Unknown;
    };
    let axis = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_f64)
            .map_or(0, |v| v.clamp(i32::MIN as f64, i32::MAX as f64) as i32)
    };
    let button = object.get("b").and_then(Value::as_str).and_then(|name| {
        let button = MouseButtons::from_name(name);
        if button.is_none() {
            debug!("Unknown mouse button {}", name);
        }
        button
    });
    Instruction::MouseMove {
        x: axis("x"),
        y: axis("y"),
        wheel: axis("w"),
        button,
    }
}
