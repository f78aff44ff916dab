//! Quadrature rotary encoder with a push switch.
//!
//! The quadrature decoding follows <https://github.com/leshow/rotary-encoder-hal/blob/master/src/lib.rs>
use embedded_hal::digital::InputPin;

use crate::encoder::EncoderInput;

/// The encoder direction is either `Clockwise`, `CounterClockwise`, or `None`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Clockwise,
    CounterClockwise,
    None,
}

/// Decides which quadrature transitions count as a step, and in which direction.
///
/// `s` holds the previous pin levels in bits 0..2 and the new levels in bits 2..4.
pub trait Phase {
    fn direction(&mut self, s: u8) -> Direction;
}

/// Every transition is a step
pub struct DefaultPhase;

impl Phase for DefaultPhase {
    fn direction(&mut self, s: u8) -> Direction {
        match s {
            0b0001 | 0b0111 | 0b1000 | 0b1110 => Direction::Clockwise,
            0b0010 | 0b0100 | 0b1011 | 0b1101 => Direction::CounterClockwise,
            _ => Direction::None,
        }
    }
}

/// Phase for E8H7 encoders, two steps per detent cycle
pub struct E8H7Phase;

impl Phase for E8H7Phase {
    fn direction(&mut self, s: u8) -> Direction {
        match s {
            0b0010 | 0b1101 => Direction::Clockwise,
            0b0001 | 0b1110 => Direction::CounterClockwise,
            _ => Direction::None,
        }
    }
}

/// Counts pulses and reports one step every `resolution` pulses
pub struct ResolutionPhase {
    resolution: i8,
    lut: [i8; 16],
    pulses: i8,
}

impl ResolutionPhase {
    pub fn new(resolution: u8, reverse: bool) -> Self {
        // Pulse per state transition, same table as QMK
        let mut lut = [0, -1, 1, 0, 1, 0, 0, -1, -1, 0, 0, 1, 0, 1, -1, 0];
        if reverse {
            lut = lut.map(|x| -x);
        }
        Self {
            resolution: resolution.clamp(1, i8::MAX as u8) as i8,
            lut,
            pulses: 0,
        }
    }
}

impl Phase for ResolutionPhase {
    fn direction(&mut self, s: u8) -> Direction {
        if (s & 0xC) != (s & 0x3) {
            self.pulses += self.lut[s as usize & 0xF];
            if self.pulses >= self.resolution {
                self.pulses %= self.resolution;
                return Direction::CounterClockwise;
            } else if self.pulses <= -self.resolution {
                self.pulses %= self.resolution;
                return Direction::Clockwise;
            }
        }
        Direction::None
    }
}

/// Rotary encoder on two quadrature pins and an active-low switch pin.
///
/// The pins are sampled whenever [`EncoderInput::position`] is called, so it must be polled often enough to see
/// every transition.
pub struct RotaryEncoder<A, B, SW, P = DefaultPhase> {
    pin_a: A,
    pin_b: B,
    switch: SW,
    state: u8,
    phase: P,
    position: i32,
}

impl<A: InputPin, B: InputPin, SW: InputPin> RotaryEncoder<A, B, SW, DefaultPhase> {
    pub fn new(pin_a: A, pin_b: B, switch: SW) -> Self {
        Self::with_phase(pin_a, pin_b, switch, DefaultPhase)
    }
}

impl<A: InputPin, B: InputPin, SW: InputPin> RotaryEncoder<A, B, SW, ResolutionPhase> {
    pub fn with_resolution(pin_a: A, pin_b: B, switch: SW, resolution: u8, reverse: bool) -> Self {
        Self::with_phase(pin_a, pin_b, switch, ResolutionPhase::new(resolution, reverse))
    }
}

impl<A: InputPin, B: InputPin, SW: InputPin, P: Phase> RotaryEncoder<A, B, SW, P> {
    pub fn with_phase(pin_a: A, pin_b: B, switch: SW, phase: P) -> Self {
        Self {
            pin_a,
            pin_b,
            switch,
            state: 0,
            phase,
            position: 0,
        }
    }

    /// Sample the quadrature pins once. Pin read errors count as no movement
    pub fn update(&mut self) -> Direction {
        // Previous levels in the low bits
        let mut s = self.state & 0b11;

        match self.pin_a.is_low() {
            Ok(true) => s |= 0b0100,
            Ok(false) => {}
            Err(_) => return Direction::None,
        }
        match self.pin_b.is_low() {
            Ok(true) => s |= 0b1000,
            Ok(false) => {}
            Err(_) => return Direction::None,
        }
        self.state = s >> 2;

        let direction = self.phase.direction(s);
        match direction {
            Direction::Clockwise => self.position = self.position.wrapping_add(1),
            Direction::CounterClockwise => self.position = self.position.wrapping_sub(1),
            Direction::None => {}
        }
        direction
    }

    /// Consumes the encoder, returning the pins
    pub fn into_inner(self) -> (A, B, SW) {
        (self.pin_a, self.pin_b, self.switch)
    }
}

impl<A: InputPin, B: InputPin, SW: InputPin, P: Phase> EncoderInput for RotaryEncoder<A, B, SW, P> {
    fn position(&mut self) -> i32 {
        self.update();
        self.position
    }

    fn switch_pressed(&mut self) -> bool {
        self.switch.is_low().unwrap_or(false)
    }
}
