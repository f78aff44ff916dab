//! Input devices read directly from GPIO pins.
//!
//! Boards whose encoder or keys are handled by other drivers implement [`EncoderInput`](crate::encoder::EncoderInput)
//! and [`KeyMatrix`](crate::channel::KeyMatrix) themselves.
pub mod rotary_encoder;

pub use rotary_encoder::RotaryEncoder;
