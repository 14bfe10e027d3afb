//! Outbound application events.
//!
//! The [`ProvisioningService`](super::service::ProvisioningService) emits
//! these through the [`EventSink`](super::ports::EventSink) port. Adapters
//! decide what to do with them: log lines, counters, a status display.

use crate::protocol::codec::{FrameError, PacketKind};
use crate::protocol::transport::SendOutcome;

/// Structured events emitted by the provisioning core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// A central connected.
    PeerConnected,

    /// The central disconnected; `discarded` fragments were dropped.
    PeerDisconnected { discarded: usize },

    /// Notify subscription changed.
    SubscriptionChanged(bool),

    /// A frame passed validation and its payload joined the session.
    FragmentAccepted {
        kind: PacketKind,
        len: u8,
        held: usize,
    },

    /// A write failed validation and was dropped.
    FrameRejected(FrameError),

    /// A valid frame arrived while the session was already complete.
    SessionOverflow,

    /// All fields arrived and a record was assembled.
    RecordMaterialized,

    /// The authorizer ruled on the record.
    Authorization { authorized: bool },

    /// The authorizer failed; the record is still consumed.
    AuthorizationFailed,

    /// Authorizer returned text that is not valid hex.
    ResponseNotHex,

    /// Outcome of one outbound frame.
    Response(SendOutcome),

    /// Best-effort journal write failed.
    JournalFailed,

    /// Join request queued for the network worker.
    NetworkRequested { ssid: String },

    /// Join queue full; request dropped.
    NetworkQueueFull,

    /// Network worker finished a join attempt.
    NetworkJoined { ssid: String, joined: bool },

    /// A stalled partial session was discarded.
    SessionEvicted { discarded: usize },
}
