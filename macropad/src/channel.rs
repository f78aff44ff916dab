//! Key events from the scanning side to the main loop.
use embassy_sync::channel::Channel;

use crate::RawMutex;

pub const KEY_EVENT_CHANNEL_SIZE: usize = 16;

/// A key changed state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyEvent {
    /// Key index, matches the index of the key indicator
    pub index: usize,
    pub pressed: bool,
}

impl KeyEvent {
    pub fn pressed(index: usize) -> Self {
        Self { index, pressed: true }
    }

    pub fn released(index: usize) -> Self {
        Self { index, pressed: false }
    }
}

/// Channel for key events, filled by the key scanner (which may run in interrupt context), drained by the main loop
pub static KEY_EVENT_CHANNEL: Channel<RawMutex, KeyEvent, KEY_EVENT_CHANNEL_SIZE> = Channel::new();

/// Source of key events, polled once per loop iteration
pub trait KeyMatrix {
    fn poll_key_event(&mut self) -> Option<KeyEvent>;
}

/// [`KeyMatrix`] reading from [`KEY_EVENT_CHANNEL`]
#[derive(Clone, Copy, Debug, Default)]
pub struct ChannelKeyMatrix;

impl KeyMatrix for ChannelKeyMatrix {
    fn poll_key_event(&mut self) -> Option<KeyEvent> {
        KEY_EVENT_CHANNEL.try_receive().ok()
    }
}

/// Queue a key event without blocking, returns `false` if the channel is full
pub fn send_key_event(event: KeyEvent) -> bool {
    match KEY_EVENT_CHANNEL.try_send(event) {
        Ok(()) => true,
        Err(_) => {
            warn!("Key event channel full, dropped {:?}", event);
            false
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_channel_key_matrix() {
        let mut matrix = ChannelKeyMatrix;
        assert!(send_key_event(KeyEvent::pressed(3)));
        assert!(send_key_event(KeyEvent::released(3)));
        assert_eq!(matrix.poll_key_event(), Some(KeyEvent::pressed(3)));
        assert_eq!(matrix.poll_key_event(), Some(KeyEvent::released(3)));
        assert_eq!(matrix.poll_key_event(), None);
    }
}
