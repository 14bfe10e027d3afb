//! Inbound link events.
//!
//! Everything the peripheral reacts to, radio callbacks and console input
//! alike, is funnelled into one [`LinkEvent`] stream so a single consumer
//! owns the session and subscription state.

use log::warn;

use crate::protocol::codec::{self, FrameBuf, FrameError};

/// Longest console line accepted onto the queue. Matches the largest
/// notification the radio will carry.
pub const CONSOLE_LINE_MAX: usize = 512;

pub type ConsoleLine = heapless::String<CONSOLE_LINE_MAX>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A central connected.
    Connected,

    /// The central went away; the partial session is discarded.
    Disconnected,

    /// Peer enabled notifications on the TX characteristic.
    Subscribed,

    /// Peer disabled notifications.
    Unsubscribed,

    /// One characteristic write, expected to carry exactly one frame.
    Write(FrameBuf),

    /// A write too long to be a frame, already judged by the codec.
    Malformed { len: usize, error: FrameError },

    /// One line typed at the admin console.
    Console(ConsoleLine),

    /// Stop the connection loop.
    Shutdown,
}

impl LinkEvent {
    /// Build a write event; `None` if `bytes` exceed the largest legal frame.
    pub fn write(bytes: &[u8]) -> Option<Self> {
        FrameBuf::from_slice(bytes).ok().map(Self::Write)
    }

    /// Event for whatever arrived on the RX characteristic. Writes that do
    /// not fit a frame buffer are validated here and carried as
    /// [`LinkEvent::Malformed`] so the rejection still reaches the service.
    pub fn received(bytes: &[u8]) -> Self {
        match Self::write(bytes) {
            Some(event) => event,
            None => Self::Malformed {
                len: bytes.len(),
                error: codec::validate(bytes).err().unwrap_or(FrameError::LengthMismatch),
            },
        }
    }

    /// Build a console event, truncating at a char boundary.
    pub fn console(line: &str) -> Self {
        let mut out = ConsoleLine::new();
        for c in line.chars() {
            if out.push(c).is_err() {
                warn!(
                    "CONSOLE: line of {} bytes truncated to {}",
                    line.len(),
                    out.len()
                );
                break;
            }
        }
        Self::Console(out)
    }
}
