#![allow(dead_code)]

use std::collections::VecDeque;

use embassy_time::Instant;
use macropad::channel::{KeyEvent, KeyMatrix};
use macropad::config::MacroPadConfig;
use macropad::display::{Display, LabelStyle, Pixels};
use macropad::encoder::EncoderInput;
use macropad::hid::{Audio, ConsumerHid, HidError, KeyboardHid, Midi, MouseHid};
use macropad::host::SerialPort;
use macropad::macro_store::MacroStore;
use macropad::storage::RamStorage;
use macropad::system::SystemControl;
use macropad::types::color::Rgb;
use macropad::types::keycode::{ConsumerKey, HidKeyCode};
use macropad::types::layout::KeyboardLayout;
use macropad::types::mouse_button::MouseButtons;
use macropad::MacroPad;
use serde_json::Value;

// Init logger for tests
#[ctor::ctor]
pub fn init_log() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

pub const NUM_KEYS: usize = 12;

pub type TestPad = MacroPad<'static, MockDevice, RamStorage, NUM_KEYS>;

/// HID side effects recorded by [`MockDevice`]
#[derive(Debug, Clone, PartialEq)]
pub enum Hid {
    Press(HidKeyCode),
    Release(HidKeyCode),
    ReleaseAll,
    Text(String, KeyboardLayout),
    Consumer(ConsumerKey),
    ConsumerUp,
    Click(MouseButtons),
    Move(i32, i32, i32),
    ButtonsUp,
    Tone(u32),
    ToneOff,
    File(String),
    NoteOn(u8, u8),
    NoteOff(u8, u8),
    Bend(u16),
    Cc(u8, u8),
    Pc(u8),
}

/// A whole macropad in memory: HID, display, LEDs, keys, encoder, serial port and resets
pub struct MockDevice {
    pub hid: Vec<Hid>,
    pub labels: Vec<(String, LabelStyle)>,
    pub title: String,
    pub pixels: Vec<Rgb>,
    pub shows: usize,
    pub sleeping: bool,
    pub brightness: f64,
    pub pixel_brightness: f64,
    pub refreshes: usize,
    pub key_events: VecDeque<KeyEvent>,
    pub encoder_position: i32,
    pub encoder_switch: bool,
    pub connected: bool,
    pub serial_in: VecDeque<u8>,
    pub serial_out: Vec<u8>,
    pub soft_resets: usize,
    pub hard_resets: usize,
    pub free_memory: Option<usize>,
    pub reclaims: usize,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            hid: Vec::new(),
            labels: vec![(String::new(), LabelStyle::NEUTRAL); NUM_KEYS],
            title: String::new(),
            pixels: vec![Rgb::BLACK; NUM_KEYS],
            shows: 0,
            sleeping: false,
            brightness: 0.0,
            pixel_brightness: 0.0,
            refreshes: 0,
            key_events: VecDeque::new(),
            encoder_position: 0,
            encoder_switch: false,
            connected: false,
            serial_in: VecDeque::new(),
            serial_out: Vec::new(),
            soft_resets: 0,
            hard_resets: 0,
            free_memory: None,
            reclaims: 0,
        }
    }

    pub fn take_hid(&mut self) -> Vec<Hid> {
        std::mem::take(&mut self.hid)
    }

    pub fn press(&mut self, index: usize) {
        self.key_events.push_back(KeyEvent::pressed(index));
    }

    pub fn release(&mut self, index: usize) {
        self.key_events.push_back(KeyEvent::released(index));
    }

    pub fn send_line(&mut self, line: &str) {
        self.serial_in.extend(line.as_bytes());
        self.serial_in.push_back(b'\n');
    }

    /// Lines written to the host since the last call
    pub fn take_lines(&mut self) -> Vec<String> {
        let out = std::mem::take(&mut self.serial_out);
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Label text of a key without the centering
    pub fn label(&self, index: usize) -> &str {
        self.labels[index].0.trim()
    }
}

impl KeyboardHid for MockDevice {
    fn press_key(&mut self, key: HidKeyCode) {
        self.hid.push(Hid::Press(key));
    }

    fn release_key(&mut self, key: HidKeyCode) {
        self.hid.push(Hid::Release(key));
    }

    fn release_all_keys(&mut self) {
        self.hid.push(Hid::ReleaseAll);
    }

    fn write_text(&mut self, text: &str, layout: KeyboardLayout) {
        self.hid.push(Hid::Text(text.to_string(), layout));
    }
}

impl ConsumerHid for MockDevice {
    fn press_consumer(&mut self, key: ConsumerKey) {
        self.hid.push(Hid::Consumer(key));
    }

    fn release_consumer(&mut self) {
        self.hid.push(Hid::ConsumerUp);
    }
}

impl MouseHid for MockDevice {
    fn click(&mut self, buttons: MouseButtons) {
        self.hid.push(Hid::Click(buttons));
    }

    fn move_by(&mut self, x: i32, y: i32, wheel: i32) {
        self.hid.push(Hid::Move(x, y, wheel));
    }

    fn release_all_buttons(&mut self) {
        self.hid.push(Hid::ButtonsUp);
    }
}

impl Audio for MockDevice {
    fn start_tone(&mut self, frequency: u32) {
        self.hid.push(Hid::Tone(frequency));
    }

    fn stop_tone(&mut self) {
        self.hid.push(Hid::ToneOff);
    }

    fn play_file(&mut self, path: &str) -> Result<(), HidError> {
        self.hid.push(Hid::File(path.to_string()));
        Err(HidError::FileNotFound)
    }
}

impl Midi for MockDevice {
    fn note_on(&mut self, note: u8, velocity: u8) {
        self.hid.push(Hid::NoteOn(note, velocity));
    }

    fn note_off(&mut self, note: u8, velocity: u8) {
        self.hid.push(Hid::NoteOff(note, velocity));
    }

    fn pitch_bend(&mut self, value: u16) {
        self.hid.push(Hid::Bend(value));
    }

    fn control_change(&mut self, control: u8, value: u8) {
        self.hid.push(Hid::Cc(control, value));
    }

    fn program_change(&mut self, program: u8) {
        self.hid.push(Hid::Pc(program));
    }
}

impl Display for MockDevice {
    fn set_key_label(&mut self, index: usize, text: &str, style: LabelStyle) {
        self.labels[index] = (text.to_string(), style);
    }

    fn set_title(&mut self, text: &str) {
        self.title = text.to_string();
    }

    fn set_sleep(&mut self, sleep: bool) {
        self.sleeping = sleep;
    }

    fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    fn set_brightness(&mut self, brightness: f64) {
        self.brightness = brightness;
    }

    fn refresh(&mut self) {
        self.refreshes += 1;
    }
}

impl Pixels for MockDevice {
    fn set_pixel(&mut self, index: usize, color: Rgb) {
        self.pixels[index] = color;
    }

    fn set_pixel_brightness(&mut self, brightness: f64) {
        self.pixel_brightness = brightness;
    }

    fn show(&mut self) {
        self.shows += 1;
    }
}

impl KeyMatrix for MockDevice {
    fn poll_key_event(&mut self) -> Option<KeyEvent> {
        self.key_events.pop_front()
    }
}

impl EncoderInput for MockDevice {
    fn position(&mut self) -> i32 {
        self.encoder_position
    }

    fn switch_pressed(&mut self) -> bool {
        self.encoder_switch
    }
}

impl SerialPort for MockDevice {
    fn connected(&mut self) -> bool {
        self.connected
    }

    fn in_waiting(&mut self) -> usize {
        self.serial_in.len()
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.serial_in.len());
        for (slot, byte) in buf.iter_mut().zip(self.serial_in.drain(..n)) {
            *slot = byte;
        }
        n
    }

    fn write(&mut self, bytes: &[u8]) {
        self.serial_out.extend_from_slice(bytes);
    }
}

impl SystemControl for MockDevice {
    fn soft_reset(&mut self) {
        self.soft_resets += 1;
    }

    fn hard_reset(&mut self) {
        self.hard_resets += 1;
    }

    fn free_memory(&self) -> Option<usize> {
        self.free_memory
    }

    fn reclaim_memory(&mut self) {
        self.reclaims += 1;
    }
}

pub fn at(ms: u64) -> Instant {
    Instant::from_millis(ms)
}

/// Storage holding `macros` (flat or nested tree) as the saved macro file
pub fn storage_with_macros(macros: Value) -> RamStorage {
    let mut storage = RamStorage::new();
    let store = MacroStore::from_json(&macros).unwrap();
    assert!(store.save(&mut storage, "macros.json"));
    storage
}

pub fn create_pad(macros: Value) -> TestPad {
    MacroPad::new(MockDevice::new(), storage_with_macros(macros), MacroPadConfig::default())
}

pub fn create_pad_with_config(macros: Value, config: MacroPadConfig<'static>) -> TestPad {
    MacroPad::new(MockDevice::new(), storage_with_macros(macros), config)
}
