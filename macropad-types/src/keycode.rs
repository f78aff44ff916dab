//! HID key codes and consumer keys, plus lookups by the names used in macro files.
use serde::{Deserialize, Serialize};
use strum::FromRepr;

use crate::modifier::HidModifiers;
use crate::upper_ascii;

/// Key codes on the HID keyboard/keypad usage page (0x07)
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, PartialOrd, Ord, FromRepr)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HidKeyCode {
    // Reserved and error codes
    No = 0x00,
    ErrorRollover = 0x01,
    PostFail = 0x02,
    ErrorUndefined = 0x03,

    // Letters
    A = 0x04,
    B = 0x05,
    C = 0x06,
    D = 0x07,
    E = 0x08,
    F = 0x09,
    G = 0x0A,
    H = 0x0B,
    I = 0x0C,
    J = 0x0D,
    K = 0x0E,
    L = 0x0F,
    M = 0x10,
    N = 0x11,
    O = 0x12,
    P = 0x13,
    Q = 0x14,
    R = 0x15,
    S = 0x16,
    T = 0x17,
    U = 0x18,
    V = 0x19,
    W = 0x1A,
    X = 0x1B,
    Y = 0x1C,
    Z = 0x1D,

    // Number row
    Kc1 = 0x1E,
    Kc2 = 0x1F,
    Kc3 = 0x20,
    Kc4 = 0x21,
    Kc5 = 0x22,
    Kc6 = 0x23,
    Kc7 = 0x24,
    Kc8 = 0x25,
    Kc9 = 0x26,
    Kc0 = 0x27,

    // Editing and whitespace
    Enter = 0x28,
    Escape = 0x29,
    Backspace = 0x2A,
    Tab = 0x2B,
    Space = 0x2C,
    Minus = 0x2D,
    Equal = 0x2E,
    LeftBracket = 0x2F,
    RightBracket = 0x30,
    Backslash = 0x31,
    NonusHash = 0x32,
    Semicolon = 0x33,
    Quote = 0x34,
    Grave = 0x35,
    Comma = 0x36,
    Dot = 0x37,
    Slash = 0x38,
    CapsLock = 0x39,

    // Function keys
    F1 = 0x3A,
    F2 = 0x3B,
    F3 = 0x3C,
    F4 = 0x3D,
    F5 = 0x3E,
    F6 = 0x3F,
    F7 = 0x40,
    F8 = 0x41,
    F9 = 0x42,
    F10 = 0x43,
    F11 = 0x44,
    F12 = 0x45,

    // Navigation cluster
    PrintScreen = 0x46,
    ScrollLock = 0x47,
    Pause = 0x48,
    Insert = 0x49,
    Home = 0x4A,
    PageUp = 0x4B,
    Delete = 0x4C,
    End = 0x4D,
    PageDown = 0x4E,
    Right = 0x4F,
    Left = 0x50,
    Down = 0x51,
    Up = 0x52,

    // Keypad
    NumLock = 0x53,
    KpSlash = 0x54,
    KpAsterisk = 0x55,
    KpMinus = 0x56,
    KpPlus = 0x57,
    KpEnter = 0x58,
    Kp1 = 0x59,
    Kp2 = 0x5A,
    Kp3 = 0x5B,
    Kp4 = 0x5C,
    Kp5 = 0x5D,
    Kp6 = 0x5E,
    Kp7 = 0x5F,
    Kp8 = 0x60,
    Kp9 = 0x61,
    Kp0 = 0x62,
    KpDot = 0x63,

    // Extended keys
    NonusBackslash = 0x64,
    Application = 0x65,
    KbPower = 0x66,
    KpEqual = 0x67,
    F13 = 0x68,
    F14 = 0x69,
    F15 = 0x6A,
    F16 = 0x6B,
    F17 = 0x6C,
    F18 = 0x6D,
    F19 = 0x6E,
    F20 = 0x6F,
    F21 = 0x70,
    F22 = 0x71,
    F23 = 0x72,
    F24 = 0x73,
    Execute = 0x74,
    Help = 0x75,
    Menu = 0x76,
    Select = 0x77,
    Stop = 0x78,
    Again = 0x79,
    Undo = 0x7A,
    Cut = 0x7B,
    Copy = 0x7C,
    Paste = 0x7D,
    Find = 0x7E,
    KbMute = 0x7F,
    KbVolumeUp = 0x80,
    KbVolumeDown = 0x81,
    LockingCapsLock = 0x82,
    LockingNumLock = 0x83,
    LockingScrollLock = 0x84,
    KpComma = 0x85,
    KpEqualAs400 = 0x86,

    // International and language keys
    International1 = 0x87,
    International2 = 0x88,
    International3 = 0x89,
    International4 = 0x8A,
    International5 = 0x8B,
    International6 = 0x8C,
    International7 = 0x8D,
    International8 = 0x8E,
    International9 = 0x8F,
    Language1 = 0x90,
    Language2 = 0x91,
    Language3 = 0x92,
    Language4 = 0x93,
    Language5 = 0x94,
    Language6 = 0x95,
    Language7 = 0x96,
    Language8 = 0x97,
    Language9 = 0x98,

    // Legacy system keys
    AlternateErase = 0x99,
    SystemRequest = 0x9A,
    Cancel = 0x9B,
    Clear = 0x9C,
    Prior = 0x9D,
    Return = 0x9E,
    Separator = 0x9F,
    Out = 0xA0,
    Oper = 0xA1,
    ClearAgain = 0xA2,
    Crsel = 0xA3,
    Exsel = 0xA4,

    // Modifiers
    LCtrl = 0xE0,
    LShift = 0xE1,
    LAlt = 0xE2,
    LGui = 0xE3,
    RCtrl = 0xE4,
    RShift = 0xE5,
    RAlt = 0xE6,
    RGui = 0xE7,
}

impl HidKeyCode {
    /// Returns `true` if the keycode is a modifier keycode
    pub fn is_modifier(self) -> bool {
        HidKeyCode::LCtrl <= self && self <= HidKeyCode::RGui
    }

    /// The modifier bit of this key in a keyboard report, empty for non-modifier keys
    pub fn to_hid_modifiers(self) -> HidModifiers {
        match self {
            HidKeyCode::LCtrl => HidModifiers::new().with_left_ctrl(true),
            HidKeyCode::LShift => HidModifiers::new().with_left_shift(true),
            HidKeyCode::LAlt => HidModifiers::new().with_left_alt(true),
            HidKeyCode::LGui => HidModifiers::new().with_left_gui(true),
            HidKeyCode::RCtrl => HidModifiers::new().with_right_ctrl(true),
            HidKeyCode::RShift => HidModifiers::new().with_right_shift(true),
            HidKeyCode::RAlt => HidModifiers::new().with_right_alt(true),
            HidKeyCode::RGui => HidModifiers::new().with_right_gui(true),
            _ => HidModifiers::new(),
        }
    }

    /// Look up a key by its macro-file name, e.g. `A`, `ONE`, `ENTER`, `LEFT_SHIFT` or `F13`.
    ///
    /// The lookup is case-insensitive. Returns `None` for unknown names.
    pub fn from_name(name: &str) -> Option<HidKeyCode> {
        let mut buf = [0u8; 24];
        let name = upper_ascii(name, &mut buf)?;

        if let [c @ b'A'..=b'Z'] = name.as_bytes() {
            return Self::from_repr(HidKeyCode::A as u8 + (c - b'A'));
        }
        if let Some(n) = name.strip_prefix('F').and_then(|n| n.parse::<u8>().ok()) {
            return match n {
                1..=12 => Self::from_repr(HidKeyCode::F1 as u8 + n - 1),
                13..=24 => Self::from_repr(HidKeyCode::F13 as u8 + n - 13),
                _ => None,
            };
        }
        if let Some(digit) = name.strip_prefix("KEYPAD_").and_then(digit_from_name) {
            // Keypad digits run 1..9 then 0
            return Self::from_repr(HidKeyCode::Kp1 as u8 + (digit + 9) % 10);
        }
        if let Some(digit) = digit_from_name(name) {
            return Self::from_repr(HidKeyCode::Kc1 as u8 + (digit + 9) % 10);
        }

        let code = match name {
            "ENTER" | "RETURN" => HidKeyCode::Enter,
            "ESCAPE" => HidKeyCode::Escape,
            "BACKSPACE" => HidKeyCode::Backspace,
            "TAB" => HidKeyCode::Tab,
            "SPACEBAR" | "SPACE" => HidKeyCode::Space,
            "MINUS" => HidKeyCode::Minus,
            "EQUALS" => HidKeyCode::Equal,
            "LEFT_BRACKET" => HidKeyCode::LeftBracket,
            "RIGHT_BRACKET" => HidKeyCode::RightBracket,
            "BACKSLASH" => HidKeyCode::Backslash,
            "POUND" => HidKeyCode::NonusHash,
            "SEMICOLON" => HidKeyCode::Semicolon,
            "QUOTE" => HidKeyCode::Quote,
            "GRAVE_ACCENT" => HidKeyCode::Grave,
            "COMMA" => HidKeyCode::Comma,
            "PERIOD" => HidKeyCode::Dot,
            "FORWARD_SLASH" => HidKeyCode::Slash,
            "CAPS_LOCK" => HidKeyCode::CapsLock,
            "PRINT_SCREEN" => HidKeyCode::PrintScreen,
            "SCROLL_LOCK" => HidKeyCode::ScrollLock,
            "PAUSE" => HidKeyCode::Pause,
            "INSERT" => HidKeyCode::Insert,
            "HOME" => HidKeyCode::Home,
            "PAGE_UP" => HidKeyCode::PageUp,
            "DELETE" => HidKeyCode::Delete,
            "END" => HidKeyCode::End,
            "PAGE_DOWN" => HidKeyCode::PageDown,
            "RIGHT_ARROW" => HidKeyCode::Right,
            "LEFT_ARROW" => HidKeyCode::Left,
            "DOWN_ARROW" => HidKeyCode::Down,
            "UP_ARROW" => HidKeyCode::Up,
            "KEYPAD_NUMLOCK" => HidKeyCode::NumLock,
            "KEYPAD_FORWARD_SLASH" => HidKeyCode::KpSlash,
            "KEYPAD_ASTERISK" => HidKeyCode::KpAsterisk,
            "KEYPAD_MINUS" => HidKeyCode::KpMinus,
            "KEYPAD_PLUS" => HidKeyCode::KpPlus,
            "KEYPAD_ENTER" => HidKeyCode::KpEnter,
            "KEYPAD_PERIOD" => HidKeyCode::KpDot,
            "KEYPAD_BACKSLASH" => HidKeyCode::NonusBackslash,
            "KEYPAD_EQUALS" => HidKeyCode::KpEqual,
            "APPLICATION" => HidKeyCode::Application,
            "POWER" => HidKeyCode::KbPower,
            "LEFT_CONTROL" | "CONTROL" => HidKeyCode::LCtrl,
            "LEFT_SHIFT" | "SHIFT" => HidKeyCode::LShift,
            "LEFT_ALT" | "ALT" | "OPTION" => HidKeyCode::LAlt,
            "LEFT_GUI" | "GUI" | "WINDOWS" | "COMMAND" => HidKeyCode::LGui,
            "RIGHT_CONTROL" => HidKeyCode::RCtrl,
            "RIGHT_SHIFT" => HidKeyCode::RShift,
            "RIGHT_ALT" => HidKeyCode::RAlt,
            "RIGHT_GUI" => HidKeyCode::RGui,
            _ => return None,
        };
        Some(code)
    }
}

fn digit_from_name(name: &str) -> Option<u8> {
    let digit = match name {
        "ZERO" => 0,
        "ONE" => 1,
        "TWO" => 2,
        "THREE" => 3,
        "FOUR" => 4,
        "FIVE" => 5,
        "SIX" => 6,
        "SEVEN" => 7,
        "EIGHT" => 8,
        "NINE" => 9,
        _ => return None,
    };
    Some(digit)
}

impl From<u8> for HidKeyCode {
    fn from(value: u8) -> Self {
        Self::from_repr(value).unwrap_or(HidKeyCode::No)
    }
}

/// Keys in consumer page
/// Ref: <https://www.usb.org/sites/default/files/documents/hut1_12v2.pdf#page=75>
#[repr(u16)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConsumerKey {
    No = 0x00,
    // Display controls
    BrightnessUp = 0x6F,
    BrightnessDown = 0x70,
    // Transport controls
    Play = 0xB0,
    Pause = 0xB1,
    Record = 0xB2,
    FastForward = 0xB3,
    Rewind = 0xB4,
    NextTrack = 0xB5,
    PrevTrack = 0xB6,
    StopPlay = 0xB7,
    Eject = 0xB8,
    RandomPlay = 0xB9,
    Repeat = 0xBC,
    PlayPause = 0xCD,
    // Volume
    Mute = 0xE2,
    VolumeIncrement = 0xE9,
    VolumeDecrement = 0xEA,
    // Application launch
    Email = 0x18A,
    Calculator = 0x192,
    LocalBrowser = 0x194,
    Lock = 0x19E,
    // Generic GUI application controls
    Search = 0x221,
    Home = 0x223,
    Back = 0x224,
    Forward = 0x225,
    Stop = 0x226,
    Refresh = 0x227,
    Bookmarks = 0x22A,
}

impl ConsumerKey {
    /// Look up a consumer control by its macro-file name, e.g. `MUTE` or `VOLUME_INCREMENT`.
    pub fn from_name(name: &str) -> Option<ConsumerKey> {
        let mut buf = [0u8; 24];
        let key = match upper_ascii(name, &mut buf)? {
            "BRIGHTNESS_INCREMENT" => ConsumerKey::BrightnessUp,
            "BRIGHTNESS_DECREMENT" => ConsumerKey::BrightnessDown,
            "PLAY" => ConsumerKey::Play,
            "PAUSE" => ConsumerKey::Pause,
            "RECORD" => ConsumerKey::Record,
            "FAST_FORWARD" => ConsumerKey::FastForward,
            "REWIND" => ConsumerKey::Rewind,
            "SCAN_NEXT_TRACK" => ConsumerKey::NextTrack,
            "SCAN_PREVIOUS_TRACK" => ConsumerKey::PrevTrack,
            "STOP" => ConsumerKey::StopPlay,
            "EJECT" => ConsumerKey::Eject,
            "RANDOM_PLAY" => ConsumerKey::RandomPlay,
            "REPEAT" => ConsumerKey::Repeat,
            "PLAY_PAUSE" => ConsumerKey::PlayPause,
            "MUTE" => ConsumerKey::Mute,
            "VOLUME_INCREMENT" => ConsumerKey::VolumeIncrement,
            "VOLUME_DECREMENT" => ConsumerKey::VolumeDecrement,
            "EMAIL" => ConsumerKey::Email,
            "CALCULATOR" => ConsumerKey::Calculator,
            "LOCAL_BROWSER" => ConsumerKey::LocalBrowser,
            "LOCK" => ConsumerKey::Lock,
            "SEARCH" => ConsumerKey::Search,
            "BROWSER_HOME" => ConsumerKey::Home,
            "BROWSER_BACK" => ConsumerKey::Back,
            "BROWSER_FORWARD" => ConsumerKey::Forward,
            "BROWSER_STOP" => ConsumerKey::Stop,
            "BROWSER_REFRESH" => ConsumerKey::Refresh,
            "BOOKMARKS" => ConsumerKey::Bookmarks,
            _ => return None,
        };
        Some(key)
    }
}

/// Convert an ascii char to a keycode on the en-us layout.
///
/// The bool is `true` if the keycode has to be typed with shift held.
/// Characters without a key map to `HidKeyCode::No`.
pub fn from_ascii(ascii: u8) -> (HidKeyCode, bool) {
    match ascii {
        b'a'..=b'z' => (HidKeyCode::from(HidKeyCode::A as u8 + (ascii - b'a')), false),
        b'A'..=b'Z' => (HidKeyCode::from(HidKeyCode::A as u8 + (ascii - b'A')), true),
        b'0' => (HidKeyCode::Kc0, false),
        b'1'..=b'9' => (HidKeyCode::from(HidKeyCode::Kc1 as u8 + (ascii - b'1')), false),
        b'!' => (HidKeyCode::Kc1, true),
        b'@' => (HidKeyCode::Kc2, true),
        b'#' => (HidKeyCode::Kc3, true),
        b'$' => (HidKeyCode::Kc4, true),
        b'%' => (HidKeyCode::Kc5, true),
        b'^' => (HidKeyCode::Kc6, true),
        b'&' => (HidKeyCode::Kc7, true),
        b'*' => (HidKeyCode::Kc8, true),
        b'(' => (HidKeyCode::Kc9, true),
        b')' => (HidKeyCode::Kc0, true),
        b'-' => (HidKeyCode::Minus, false),
        b'_' => (HidKeyCode::Minus, true),
        b'=' => (HidKeyCode::Equal, false),
        b'+' => (HidKeyCode::Equal, true),
        b'[' => (HidKeyCode::LeftBracket, false),
        b'{' => (HidKeyCode::LeftBracket, true),
        b']' => (HidKeyCode::RightBracket, false),
        b'}' => (HidKeyCode::RightBracket, true),
        b';' => (HidKeyCode::Semicolon, false),
        b':' => (HidKeyCode::Semicolon, true),
        b'\'' => (HidKeyCode::Quote, false),
        b'"' => (HidKeyCode::Quote, true),
        b'`' => (HidKeyCode::Grave, false),
        b'~' => (HidKeyCode::Grave, true),
        b'\\' => (HidKeyCode::Backslash, false),
        b'|' => (HidKeyCode::Backslash, true),
        b',' => (HidKeyCode::Comma, false),
        b'<' => (HidKeyCode::Comma, true),
        b'.' => (HidKeyCode::Dot, false),
        b'>' => (HidKeyCode::Dot, true),
        b'/' => (HidKeyCode::Slash, false),
        b'?' => (HidKeyCode::Slash, true),
        b' ' => (HidKeyCode::Space, false),
        b'\n' => (HidKeyCode::Enter, false),
        b'\t' => (HidKeyCode::Tab, false),
        b'\x08' => (HidKeyCode::Backspace, false),
        b'\x1B' => (HidKeyCode::Escape, false),
        b'\x7F' => (HidKeyCode::Delete, false),
        _ => (HidKeyCode::No, false),
    }
}
