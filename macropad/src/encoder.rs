//! Rotary encoder edge tracking.
use heapless::Vec;

/// A rotary encoder with a push switch
pub trait EncoderInput {
    /// Accumulated detent position, increasing clockwise
    fn position(&mut self) -> i32;

    /// Current (debounced) level of the push switch
    fn switch_pressed(&mut self) -> bool;
}

/// Which encoder binding of the open group to run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncoderEvent {
    Switch,
    Increased,
    Decreased,
}

/// Turns encoder levels into edge events
#[derive(Clone, Debug, Default)]
pub struct EncoderState {
    last_position: i32,
    switch_was_pressed: bool,
}

impl EncoderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample the encoder once. Returns the switch press edge first, then at most one rotation event.
    pub fn poll<E: EncoderInput + ?Sized>(&mut self, input: &mut E) -> Vec<EncoderEvent, 2> {
        let mut events = Vec::new();

        let pressed = input.switch_pressed();
        if pressed && !self.switch_was_pressed {
            let _ = events.push(EncoderEvent::Switch);
        }
        self.switch_was_pressed = pressed;

        let position = input.position();
        if position != self.last_position {
            let event = if position > self.last_position {
                EncoderEvent::Increased
            } else {
                EncoderEvent::Decreased
            };
            let _ = events.push(event);
            self.last_position = position;
        }
        events
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct ScriptedEncoder {
        position: i32,
        switch: bool,
    }

    impl EncoderInput for ScriptedEncoder {
        fn position(&mut self) -> i32 {
            self.position
        }

        fn switch_pressed(&mut self) -> bool {
            self.switch
        }
    }

    #[test]
    fn test_edges() {
        let mut state = EncoderState::new();
        let mut encoder = ScriptedEncoder {
            position: 0,
            switch: false,
        };
        assert!(state.poll(&mut encoder).is_empty());

        encoder.switch = true;
        encoder.position = 3;
        assert_eq!(state.poll(&mut encoder), [EncoderEvent::Switch, EncoderEvent::Increased]);
        // Held switch doesn't fire again
        assert!(state.poll(&mut encoder).is_empty());

        encoder.switch = false;
        encoder.position = 1;
        assert_eq!(state.poll(&mut encoder), [EncoderEvent::Decreased]);
        assert!(state.poll(&mut encoder).is_empty());
    }
}
