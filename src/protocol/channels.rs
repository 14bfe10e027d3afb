//! Inter-task channels.
//!
//! `embassy-sync` bounded channels bridge the radio callbacks, the console
//! thread, the connection loop and the network worker. Each connection
//! owns its own set, so nothing here is a process-wide static.
//!
//! ```text
//!  BLE callbacks ─┐  LinkEvent   ┌─────────────────┐  NetworkJob  ┌────────────────┐
//!  console line ──┴────────────▶│ connection loop │─────────────▶│ network worker │
//!                                │  (single owner) │◀─────────────│   (own thread) │
//!                                └─────────────────┘  JoinOutcome └────────────────┘
//! ```

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TryReceiveError};

use crate::app::commands::LinkEvent;

/// Inbound event depth. Writes arrive one per GATT callback.
pub const INBOUND_DEPTH: usize = 16;

/// A full session needs at most one join; a few spare slots absorb bursts.
pub const JOB_DEPTH: usize = 4;

pub const OUTCOME_DEPTH: usize = 4;

/// Work for the network worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkJob {
    Join { ssid: String, passphrase: String },
    Shutdown,
}

/// Result of one join attempt, reported back to the connection loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub ssid: String,
    pub joined: bool,
}

pub type JoinQueue = Channel<CriticalSectionRawMutex, NetworkJob, JOB_DEPTH>;
pub type OutcomeQueue = Channel<CriticalSectionRawMutex, JoinOutcome, OUTCOME_DEPTH>;

/// Inbound link events for one connection.
///
/// A bounded channel plus a sticky `link_lost` flag. A `Disconnected` that
/// finds the channel full is parked in the flag instead of being dropped.
/// It is delivered once everything queued ahead of it has been consumed,
/// and no later event is accepted until it has been, so ordering holds.
pub struct InboundQueue {
    events: Channel<CriticalSectionRawMutex, LinkEvent, INBOUND_DEPTH>,
    link_lost: AtomicBool,
}

impl InboundQueue {
    pub const fn new() -> Self {
        Self {
            events: Channel::new(),
            link_lost: AtomicBool::new(false),
        }
    }

    /// Push without blocking. `false` means the event was not taken and the
    /// producer should make the peer retry. `Disconnected` is always taken.
    pub fn offer(&self, event: LinkEvent) -> bool {
        if !self.flush_lost() {
            return event == LinkEvent::Disconnected;
        }
        if event == LinkEvent::Disconnected {
            if self.events.try_send(event).is_err() {
                self.link_lost.store(true, Ordering::Release);
            }
            return true;
        }
        self.events.try_send(event).is_ok()
    }

    /// Push, waiting for room.
    pub async fn send(&self, event: LinkEvent) {
        if self.link_lost.swap(false, Ordering::AcqRel) {
            self.events.send(LinkEvent::Disconnected).await;
        }
        self.events.send(event).await;
    }

    pub fn try_receive(&self) -> Result<LinkEvent, TryReceiveError> {
        match self.events.try_receive() {
            Err(TryReceiveError::Empty) if self.link_lost.swap(false, Ordering::AcqRel) => {
                Ok(LinkEvent::Disconnected)
            }
            other => other,
        }
    }

    pub async fn receive(&self) -> LinkEvent {
        if let Ok(event) = self.try_receive() {
            return event;
        }
        self.events.receive().await
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && !self.link_lost.load(Ordering::Acquire)
    }

    /// Move a parked `Disconnected` into the channel. `false` while it
    /// still does not fit.
    fn flush_lost(&self) -> bool {
        if !self.link_lost.swap(false, Ordering::AcqRel) {
            return true;
        }
        if self.events.try_send(LinkEvent::Disconnected).is_err() {
            self.link_lost.store(true, Ordering::Release);
            return false;
        }
        true
    }
}

impl Default for InboundQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Push an event without blocking. Returns `false` when the queue is full.
pub fn offer(queue: &InboundQueue, event: LinkEvent) -> bool {
    queue.offer(event)
}
