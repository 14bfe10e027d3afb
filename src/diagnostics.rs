//! Link statistics and runtime diagnostics.
//!
//! [`LinkStats`] is an [`EventSink`] that counts what the provisioning core
//! reports. It is paired with the log sink in the binary and dumped as JSON
//! when the connection loop ends.

use serde::{Deserialize, Serialize};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::protocol::codec::FrameError;
use crate::protocol::transport::SendOutcome;

/// Rejections broken down by validation failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectCounts {
    pub too_short: u32,
    pub bad_header: u32,
    pub length_mismatch: u32,
    pub bad_footer: u32,
    pub checksum_mismatch: u32,
}

impl RejectCounts {
    pub fn total(&self) -> u32 {
        self.too_short + self.bad_header + self.length_mismatch + self.bad_footer + self.checksum_mismatch
    }

    fn bump(&mut self, e: FrameError) {
        let slot = match e {
            FrameError::TooShort => &mut self.too_short,
            FrameError::BadHeader => &mut self.bad_header,
            FrameError::LengthMismatch => &mut self.length_mismatch,
            FrameError::BadFooter => &mut self.bad_footer,
            FrameError::ChecksumMismatch => &mut self.checksum_mismatch,
        };
        *slot = slot.saturating_add(1);
    }
}

/// Counters over the lifetime of one connection loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStats {
    pub connections: u32,
    pub frames_accepted: u32,
    pub frames_rejected: RejectCounts,
    pub session_overflows: u32,
    pub records_materialized: u32,
    pub sessions_evicted: u32,
    pub fragments_discarded: u64,
    pub authorized: u32,
    pub denied: u32,
    pub auth_failures: u32,
    pub responses_sent: u32,
    pub responses_suppressed: u32,
    pub responses_failed: u32,
    pub journal_failures: u32,
    pub joins_ok: u32,
    pub joins_failed: u32,
}

impl LinkStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl EventSink for LinkStats {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::PeerConnected => self.connections += 1,
            AppEvent::PeerDisconnected { discarded } => {
                self.fragments_discarded += *discarded as u64;
            }
            AppEvent::FragmentAccepted { .. } => self.frames_accepted += 1,
            AppEvent::FrameRejected(e) => self.frames_rejected.bump(*e),
            AppEvent::SessionOverflow => self.session_overflows += 1,
            AppEvent::RecordMaterialized => self.records_materialized += 1,
            AppEvent::SessionEvicted { discarded } => {
                self.sessions_evicted += 1;
                self.fragments_discarded += *discarded as u64;
            }
            AppEvent::Authorization { authorized: true } => self.authorized += 1,
            AppEvent::Authorization { authorized: false } => self.denied += 1,
            AppEvent::AuthorizationFailed | AppEvent::ResponseNotHex => self.auth_failures += 1,
            AppEvent::Response(SendOutcome::Sent) => self.responses_sent += 1,
            AppEvent::Response(SendOutcome::Suppressed) => self.responses_suppressed += 1,
            AppEvent::Response(SendOutcome::Failed) => self.responses_failed += 1,
            AppEvent::JournalFailed => self.journal_failures += 1,
            AppEvent::NetworkJoined { joined: true, .. } => self.joins_ok += 1,
            AppEvent::NetworkJoined { joined: false, .. } | AppEvent::NetworkQueueFull => {
                self.joins_failed += 1;
            }
            AppEvent::SubscriptionChanged(_) | AppEvent::NetworkRequested { .. } => {}
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Panic hook
// ───────────────────────────────────────────────────────────────

/// Route panics through the logger so they reach the UART / stderr with
/// the same formatting as everything else.
pub fn install_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        let reason = if let Some(msg) = info.payload().downcast_ref::<&str>() {
            *msg
        } else if let Some(msg) = info.payload().downcast_ref::<String>() {
            msg.as_str()
        } else {
            "unknown panic"
        };
        match info.location() {
            Some(at) => log::error!("PANIC: {} at {}:{}", reason, at.file(), at.line()),
            None => log::error!("PANIC: {}", reason),
        }

        #[cfg(target_os = "espidf")]
        {
            // SAFETY: heap statistics are plain reads, valid in panic context.
            let free = unsafe { esp_idf_svc::sys::esp_get_free_heap_size() };
            log::error!("PANIC: free heap {} bytes", free);
        }
    }));
}
