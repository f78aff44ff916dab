//! Communication protocol between the macropad and its companion host application.
//!
//! The host protocol is newline-delimited json over the serial data channel, see [`host`].
pub mod host;
