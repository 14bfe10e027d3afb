//! Port traits: the hexagonal boundary between the provisioning core and
//! the radio, storage and network collaborators.
//!
//! ```text
//!   BLE write ──▶ LinkEvent ──▶ ProvisioningService ──▶ NotifyPort
//!                                  │     │     │
//!                    AuthorizationPort  JournalPort  JoinQueue ──▶ NetworkPort
//! ```
//!
//! Adapters implement these traits. [`ProvisioningService`] consumes them
//! through generics at each call site, so the core is testable with mocks.
//!
//! [`ProvisioningService`]: super::service::ProvisioningService

use core::fmt;

use crate::config::ProvisioningConfig;
use crate::protocol::codec::DecodedFrame;
use crate::protocol::record::ProvisioningRecord;

// ───────────────────────────────────────────────────────────────
// Notify port (domain → radio)
// ───────────────────────────────────────────────────────────────

/// Outbound notify characteristic. Subscription gating happens in the
/// core; adapters transmit whatever they are handed.
pub trait NotifyPort {
    fn notify(&mut self, bytes: &[u8]) -> Result<(), BleError>;
}

// ───────────────────────────────────────────────────────────────
// Authorization port
// ───────────────────────────────────────────────────────────────

/// Outcome of authorizing one materialized record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthDecision {
    pub authorized: bool,
    /// Hex text the core decodes and sends back to the peer.
    pub response_hex: String,
}

/// Black-box authorization collaborator.
pub trait AuthorizationPort {
    fn decide(&mut self, record: &ProvisioningRecord) -> Result<AuthDecision, AuthError>;

    /// Optional per-fragment reply, hex encoded. Only consulted when
    /// fragment acknowledgement is enabled in config.
    fn acknowledge(&mut self, _frame: &DecodedFrame) -> Option<String> {
        None
    }
}

// ───────────────────────────────────────────────────────────────
// Network provisioning port
// ───────────────────────────────────────────────────────────────

/// Joins a Wi-Fi network. Called from the network worker, never from the
/// connection loop.
pub trait NetworkPort {
    fn join(&mut self, ssid: &str, passphrase: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Journal port (best effort persistence)
// ───────────────────────────────────────────────────────────────

/// Append-only line-oriented text logs.
///
/// Failures are reported to the caller, which logs and carries on.
pub trait JournalPort {
    /// One hex-encoded raw frame per line.
    fn append_frame(&mut self, hex_line: &str) -> Result<(), StorageError>;

    /// One formatted record block.
    fn append_record(&mut self, report: &str) -> Result<(), StorageError>;

    /// One peer-MAC line.
    fn append_peer_mac(&mut self, line: &str) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging / metrics)
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`AppEvent`](super::events::AppEvent)s here.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&mut self, event: &super::events::AppEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic uptime source for session idle tracking.
pub trait ClockPort {
    fn now_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Loads and persists [`ProvisioningConfig`].
///
/// Implementations MUST call [`ProvisioningConfig::validate`] before
/// persisting and reject, not clamp, out-of-range values.
pub trait ConfigPort {
    /// Returns the default config when nothing is stored.
    fn load(&self) -> Result<ProvisioningConfig, ConfigError>;

    /// Persist `config`. The peripheral never writes its own config; this is
    /// the entry point for factory tooling and tests.
    fn save(&mut self, config: &ProvisioningConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Port bundle
// ───────────────────────────────────────────────────────────────

/// The three collaborators the connection loop needs, as one `io` value.
pub struct PeripheralPorts<A, J, N> {
    pub auth: A,
    pub journal: J,
    pub notify: N,
}

impl<A: AuthorizationPort, J, N> AuthorizationPort for PeripheralPorts<A, J, N> {
    fn decide(&mut self, record: &ProvisioningRecord) -> Result<AuthDecision, AuthError> {
        self.auth.decide(record)
    }

    fn acknowledge(&mut self, frame: &DecodedFrame) -> Option<String> {
        self.auth.acknowledge(frame)
    }
}

impl<A, J: JournalPort, N> JournalPort for PeripheralPorts<A, J, N> {
    fn append_frame(&mut self, hex_line: &str) -> Result<(), StorageError> {
        self.journal.append_frame(hex_line)
    }

    fn append_record(&mut self, report: &str) -> Result<(), StorageError> {
        self.journal.append_record(report)
    }

    fn append_peer_mac(&mut self, line: &str) -> Result<(), StorageError> {
        self.journal.append_peer_mac(line)
    }
}

impl<A, J, N: NotifyPort> NotifyPort for PeripheralPorts<A, J, N> {
    fn notify(&mut self, bytes: &[u8]) -> Result<(), BleError> {
        self.notify.notify(bytes)
    }
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Collaborator could not reach a decision.
    Unavailable,
    /// Collaborator rejected the record contents as unusable.
    InvalidRecord(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleError {
    /// GATT stack refused the indication/notification.
    NotifyFailed,
    /// Payload larger than the characteristic allows.
    TooLarge,
    /// Stack initialisation failed.
    InitFailed,
    /// Inbound queue had no room; the peer has to retry the write.
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    NotFound,
    Full,
    IoError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    NotFound,
    /// Stored blob failed to deserialize.
    Corrupted,
    /// The `&'static str` names the field and the rule it broke.
    ValidationFailed(&'static str),
    IoError,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "authorizer unavailable"),
            Self::InvalidRecord(why) => write!(f, "invalid record: {}", why),
        }
    }
}

impl fmt::Display for BleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotifyFailed => write!(f, "notify failed"),
            Self::TooLarge => write!(f, "payload too large"),
            Self::InitFailed => write!(f, "BLE init failed"),
            Self::Busy => write!(f, "inbound queue full"),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
