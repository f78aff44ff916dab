#![doc = include_str!("../../README.md")]
//! ## Feature flags
#![doc = document_features::document_features!()]
#![no_std]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

// This mod MUST go first, so that the others see its macros.
#[macro_use]
pub(crate) mod fmt;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

pub mod boot;
pub mod channel;
pub mod config;
pub mod display;
pub mod encoder;
pub mod hid;
pub mod host;
pub mod input_device;
pub mod instruction;
pub mod interpreter;
pub mod key_indicator;
pub mod macro_store;
pub mod macropad;
pub mod navigation;
pub mod node;
pub mod settings;
pub mod storage;
pub mod system;

pub use self::macropad::MacroPad;
pub use macropad_types as types;

pub type RawMutex = CriticalSectionRawMutex;

/// Everything a macropad board provides to the firmware core
pub trait Device:
    hid::HidOutput
    + display::Display
    + display::Pixels
    + channel::KeyMatrix
    + encoder::EncoderInput
    + host::SerialPort
    + system::SystemControl
{
}

impl<T> Device for T where
    T: hid::HidOutput
        + display::Display
        + display::Pixels
        + channel::KeyMatrix
        + encoder::EncoderInput
        + host::SerialPort
        + system::SystemControl
{
}
