//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing each application event as one tagged
//! line to the `log` facade (UART on device, stderr on host).

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`].
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::PeerConnected => info!("LINK | connected"),
            AppEvent::PeerDisconnected { discarded } => {
                info!("LINK | disconnected | discarded={}", discarded);
            }
            AppEvent::SubscriptionChanged(on) => info!("LINK | notifying={}", on),
            AppEvent::FragmentAccepted { kind, len, held } => {
                debug!("FRAME | accepted | kind={:?} len={} held={}", kind, len, held);
            }
            AppEvent::FrameRejected(e) => warn!("FRAME | rejected | {} (code {})", e, e.code()),
            AppEvent::SessionOverflow => warn!("SESSION | overflow"),
            AppEvent::RecordMaterialized => info!("SESSION | record complete"),
            AppEvent::SessionEvicted { discarded } => {
                warn!("SESSION | evicted | discarded={}", discarded);
            }
            AppEvent::Authorization { authorized } => {
                info!("AUTH | authorized={}", authorized);
            }
            AppEvent::AuthorizationFailed => warn!("AUTH | collaborator failed"),
            AppEvent::ResponseNotHex => warn!("AUTH | response not hex"),
            AppEvent::Response(outcome) => debug!("TX | {:?}", outcome),
            AppEvent::JournalFailed => warn!("JOURNAL | append failed"),
            AppEvent::NetworkRequested { ssid } => info!("NET | requested | ssid='{}'", ssid),
            AppEvent::NetworkQueueFull => warn!("NET | queue full"),
            AppEvent::NetworkJoined { ssid, joined } => {
                info!("NET | result | ssid='{}' joined={}", ssid, joined);
            }
        }
    }
}
