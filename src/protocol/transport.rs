//! Notify-side subscription gate.
//!
//! The peer must subscribe to the notify characteristic before anything is
//! transmitted. Frames sent while unsubscribed are dropped, never queued
//! for a later subscribe.

use log::{debug, warn};

use crate::app::ports::NotifyPort;

/// What happened to one outbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Peer not subscribed; frame discarded.
    Suppressed,
    /// Adapter reported a transmit error.
    Failed,
}

#[derive(Debug, Default)]
pub struct NotifyGate {
    notifying: bool,
}

impl NotifyGate {
    pub const fn new() -> Self {
        Self { notifying: false }
    }

    pub fn is_notifying(&self) -> bool {
        self.notifying
    }

    pub fn subscribe(&mut self) {
        self.notifying = true;
    }

    pub fn unsubscribe(&mut self) {
        self.notifying = false;
    }

    pub fn send(&self, port: &mut impl NotifyPort, bytes: &[u8]) -> SendOutcome {
        if !self.notifying {
            debug!("GATE: not notifying, dropping {} bytes", bytes.len());
            return SendOutcome::Suppressed;
        }
        match port.notify(bytes) {
            Ok(()) => SendOutcome::Sent,
            Err(e) => {
                warn!("GATE: notify failed: {}", e);
                SendOutcome::Failed
            }
        }
    }
}
