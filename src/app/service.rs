//! Provisioning service: the hexagonal core.
//!
//! [`ProvisioningService`] owns one connection's session and subscription
//! state and turns [`LinkEvent`]s into journal lines, authorization calls,
//! notify frames and Wi-Fi join requests. All I/O flows through port
//! traits handed in at each call, so the whole pipeline runs against mocks.
//!
//! ```text
//!  Write ─▶ extract ─▶ journal(hex) ─▶ append ─▶ try_materialize
//!                                                     │ Some
//!            ┌──────────────────┬─────────────────────┤
//!            ▼                  ▼                     ▼
//!   journal(report, mac)   decide ─▶ hex ─▶ notify   JoinQueue
//! ```

use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::ProvisioningConfig;
use crate::protocol::channels::{JoinQueue, NetworkJob, OutcomeQueue};
use crate::protocol::codec::{self, FrameError, PacketKind};
use crate::protocol::record::ProvisioningRecord;
use crate::protocol::session::{Session, SessionState};
use crate::protocol::transport::NotifyGate;

use super::commands::LinkEvent;
use super::events::AppEvent;
use super::ports::{AuthorizationPort, EventSink, JournalPort, NotifyPort};

/// What the connection loop should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

// ───────────────────────────────────────────────────────────────
// ProvisioningService
// ───────────────────────────────────────────────────────────────

pub struct ProvisioningService {
    config: ProvisioningConfig,
    session: Session,
    gate: NotifyGate,
    jobs: Arc<JoinQueue>,
    outcomes: Arc<OutcomeQueue>,
    records: u32,
}

impl ProvisioningService {
    /// Build a service for one connection.
    ///
    /// `jobs` feeds the network worker and `outcomes` is its reply path.
    pub fn new(
        config: ProvisioningConfig,
        jobs: Arc<JoinQueue>,
        outcomes: Arc<OutcomeQueue>,
    ) -> Self {
        let session = Session::new(config.field_count);
        Self {
            config,
            session,
            gate: NotifyGate::new(),
            jobs,
            outcomes,
            records: 0,
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn config(&self) -> &ProvisioningConfig {
        &self.config
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn is_notifying(&self) -> bool {
        self.gate.is_notifying()
    }

    /// Records materialized since start.
    pub fn records_completed(&self) -> u32 {
        self.records
    }

    // ── Event dispatch ────────────────────────────────────────

    /// Process one inbound event.
    ///
    /// `io` satisfies every outbound port at once, which avoids a
    /// double mutable borrow while keeping each boundary explicit.
    pub fn handle_event(
        &mut self,
        event: LinkEvent,
        now_ms: u64,
        io: &mut (impl AuthorizationPort + JournalPort + NotifyPort),
        sink: &mut impl EventSink,
    ) -> Flow {
        self.drain_outcomes(sink);
        self.evict_stale(now_ms, sink);

        match event {
            LinkEvent::Connected => {
                info!("LINK: central connected");
                self.session.clear();
                self.gate.unsubscribe();
                sink.emit(&AppEvent::PeerConnected);
            }
            LinkEvent::Disconnected => {
                let discarded = self.session.len();
                self.session.clear();
                self.gate.unsubscribe();
                info!("LINK: central disconnected ({} fragments discarded)", discarded);
                sink.emit(&AppEvent::PeerDisconnected { discarded });
            }
            LinkEvent::Subscribed => {
                self.gate.subscribe();
                sink.emit(&AppEvent::SubscriptionChanged(true));
            }
            LinkEvent::Unsubscribed => {
                self.gate.unsubscribe();
                sink.emit(&AppEvent::SubscriptionChanged(false));
            }
            LinkEvent::Write(bytes) => self.on_write(&bytes, now_ms, io, sink),
            LinkEvent::Malformed { len, error } => self.reject(len, error, io, sink),
            LinkEvent::Console(line) => self.on_console(&line, io, sink),
            LinkEvent::Shutdown => {
                info!("LINK: shutdown requested");
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    /// Periodic housekeeping between events.
    pub fn on_idle_tick(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        self.drain_outcomes(sink);
        self.evict_stale(now_ms, sink);
    }

    /// Drop a partial session that has outlived the idle timeout. Runs on
    /// every event as well as on the tick.
    fn evict_stale(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        let held = self.session.len();
        if self
            .session
            .evict_if_idle(now_ms, self.config.session_idle_timeout_ms())
        {
            warn!("SESSION: evicting stalled session ({} fragments)", held);
            sink.emit(&AppEvent::SessionEvicted { discarded: held });
        }
    }

    // ── Inbound write path ────────────────────────────────────

    fn on_write(
        &mut self,
        bytes: &[u8],
        now_ms: u64,
        io: &mut (impl AuthorizationPort + JournalPort + NotifyPort),
        sink: &mut impl EventSink,
    ) {
        let frame = match codec::extract(bytes) {
            Ok(frame) => frame,
            Err(e) => return self.reject(bytes.len(), e, io, sink),
        };

        if let Err(e) = io.append_frame(&hex::encode(bytes)) {
            warn!("JOURNAL: frame append failed: {}", e);
            sink.emit(&AppEvent::JournalFailed);
        }

        let held = match self.session.append(frame.payload.clone(), now_ms) {
            Ok(state) => state_len(state, self.config.field_count.get()),
            Err(e) => {
                warn!("SESSION: {}", e);
                sink.emit(&AppEvent::SessionOverflow);
                return;
            }
        };
        debug!(
            "SESSION: fragment {}/{} ({:?}, {} bytes)",
            held,
            self.config.field_count.get(),
            frame.kind,
            frame.length
        );
        sink.emit(&AppEvent::FragmentAccepted {
            kind: frame.kind,
            len: frame.length,
            held,
        });

        if self.config.ack_fragments {
            if let Some(reply) = io.acknowledge(&frame) {
                self.send_hex(&reply, io, sink);
            }
        }

        if let Some(record) = self.session.try_materialize() {
            self.on_record(&record, io, sink);
        }
    }

    fn reject(
        &mut self,
        len: usize,
        err: FrameError,
        io: &mut impl NotifyPort,
        sink: &mut impl EventSink,
    ) {
        warn!("FRAME: dropped {} byte write: {}", len, err);
        sink.emit(&AppEvent::FrameRejected(err));
        if self.config.nack_malformed {
            self.send_nack(err, io, sink);
        }
    }

    fn on_record(
        &mut self,
        record: &ProvisioningRecord,
        io: &mut (impl AuthorizationPort + JournalPort + NotifyPort),
        sink: &mut impl EventSink,
    ) {
        self.records = self.records.wrapping_add(1);
        info!("SESSION: {}", record);
        sink.emit(&AppEvent::RecordMaterialized);

        if let Err(e) = io.append_record(&record.report()) {
            warn!("JOURNAL: record append failed: {}", e);
            sink.emit(&AppEvent::JournalFailed);
        }
        if let Some(line) = record.peer_mac_line() {
            if let Err(e) = io.append_peer_mac(&line) {
                warn!("JOURNAL: peer MAC append failed: {}", e);
                sink.emit(&AppEvent::JournalFailed);
            }
        }

        match io.decide(record) {
            Ok(decision) => {
                info!("AUTH: authorized={}", decision.authorized);
                sink.emit(&AppEvent::Authorization {
                    authorized: decision.authorized,
                });
                self.send_hex(&decision.response_hex, io, sink);
            }
            Err(e) => {
                warn!("AUTH: collaborator failed: {}", e);
                sink.emit(&AppEvent::AuthorizationFailed);
            }
        }

        self.request_join(record, sink);
    }

    fn request_join(&mut self, record: &ProvisioningRecord, sink: &mut impl EventSink) {
        let creds = record.wifi_credentials();
        let ssid = creds.ssid.clone();
        let job = NetworkJob::Join {
            ssid: creds.ssid,
            passphrase: creds.passphrase,
        };
        if self.jobs.try_send(job).is_ok() {
            info!("NET: join requested for '{}'", ssid);
            sink.emit(&AppEvent::NetworkRequested { ssid });
        } else {
            warn!("NET: job queue full, dropping join for '{}'", ssid);
            sink.emit(&AppEvent::NetworkQueueFull);
        }
    }

    // ── Console path ──────────────────────────────────────────

    fn on_console(
        &mut self,
        line: &str,
        io: &mut impl NotifyPort,
        sink: &mut impl EventSink,
    ) {
        let text = line.trim_end_matches(['\r', '\n']);
        if text.trim().is_empty() {
            return;
        }
        let outgoing = if text.trim() == self.config.console_trigger {
            self.config.console_reply.as_str()
        } else {
            text
        };
        debug!("CONSOLE: sending {} bytes", outgoing.len());
        let outcome = self.gate.send(io, outgoing.as_bytes());
        sink.emit(&AppEvent::Response(outcome));
    }

    // ── Outbound helpers ──────────────────────────────────────

    fn send_hex(&mut self, text: &str, io: &mut impl NotifyPort, sink: &mut impl EventSink) {
        match hex::decode(text.trim()) {
            Ok(bytes) => {
                let outcome = self.gate.send(io, &bytes);
                sink.emit(&AppEvent::Response(outcome));
            }
            Err(e) => {
                warn!("AUTH: response is not hex ({}), nothing sent", e);
                sink.emit(&AppEvent::ResponseNotHex);
            }
        }
    }

    fn send_nack(&mut self, err: FrameError, io: &mut impl NotifyPort, sink: &mut impl EventSink) {
        match codec::encode(PacketKind::Nack, &[err.code()]) {
            Ok(frame) => {
                let outcome = self.gate.send(io, &frame);
                sink.emit(&AppEvent::Response(outcome));
            }
            Err(e) => warn!("FRAME: nack encode failed: {}", e),
        }
    }

    fn drain_outcomes(&mut self, sink: &mut impl EventSink) {
        while let Ok(outcome) = self.outcomes.try_receive() {
            if outcome.joined {
                info!("NET: joined '{}'", outcome.ssid);
            } else {
                warn!("NET: join '{}' failed", outcome.ssid);
            }
            sink.emit(&AppEvent::NetworkJoined {
                ssid: outcome.ssid,
                joined: outcome.joined,
            });
        }
    }
}

fn state_len(state: SessionState, n: usize) -> usize {
    match state {
        SessionState::Idle => 0,
        SessionState::Accumulating(k) => k,
        SessionState::Complete => n,
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
