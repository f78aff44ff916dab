//! # Macropad Types
//!
//! This crate provides fundamental type definitions shared by the macropad firmware
//! and anything that talks to it.
//!
//! ## Modules
//!
//! - [`keycode`] - HID keyboard and consumer key codes, with name lookup
//! - [`modifier`] - HID modifier bits
//! - [`mouse_button`] - Mouse button state and combinations
//! - [`color`] - RGB colors used by key LEDs and labels
//! - [`layout`] - Keyboard layouts used to type text
//! - [`protocol`] - Host control protocol

#![no_std]

extern crate alloc;

pub mod color;
pub mod keycode;
pub mod layout;
pub mod modifier;
pub mod mouse_button;
pub mod protocol;

/// Upper-case `name` into `buf`, returning `None` when it doesn't fit.
///
/// Used by the name lookups, which are case-insensitive.
pub(crate) fn upper_ascii<'a>(name: &str, buf: &'a mut [u8]) -> Option<&'a str> {
    let name = name.trim();
    if name.len() > buf.len() || !name.is_ascii() {
        return None;
    }
    let out = &mut buf[..name.len()];
    out.copy_from_slice(name.as_bytes());
    out.make_ascii_uppercase();
    core::str::from_utf8(out).ok()
}
