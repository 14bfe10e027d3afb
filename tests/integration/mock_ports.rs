//! Shared fixtures for integration tests.
//!
//! Frame builders, a recording event sink and a rig that wires the real
//! authorizer, a temp-dir journal and the simulated BLE adapter together
//! the way `main` does.

use std::sync::Arc;

use bleprov::adapters::authorizer::HmacAuthorizer;
use bleprov::adapters::ble::BleAdapter;
use bleprov::adapters::journal::FileJournal;
use bleprov::app::commands::LinkEvent;
use bleprov::app::events::AppEvent;
use bleprov::app::ports::{EventSink, PeripheralPorts};
use bleprov::app::service::{Flow, ProvisioningService};
use bleprov::config::ProvisioningConfig;
use bleprov::protocol::channels::{InboundQueue, JoinQueue, NetworkJob, OutcomeQueue};
use bleprov::protocol::codec::{FrameBuf, FrameDate, PacketKind, encode_dated};

pub const TEST_DATE: FrameDate = FrameDate::new(14, 3, 24);

// ── Frame builders ────────────────────────────────────────────

pub fn frame(kind: PacketKind, payload: &[u8]) -> FrameBuf {
    encode_dated(TEST_DATE, kind, payload).unwrap()
}

pub fn data_frame(payload: &[u8]) -> FrameBuf {
    frame(PacketKind::Data, payload)
}

/// One single-byte fragment per field: `0x01`, `0x02`, ... `n`.
pub fn numbered_frames(n: u8) -> Vec<FrameBuf> {
    (1..=n).map(|i| data_frame(&[i])).collect()
}

/// Seventeen realistic fields with CR-terminated text, as phones send them.
pub fn record_fields(pin: &str, ssid: &str, passphrase: &str) -> Vec<Vec<u8>> {
    let mut fields: Vec<Vec<u8>> = vec![
        pin.into(),
        "user-42".into(),
        "admin".into(),
        "Ada".into(),
        "ada@example.com".into(),
        "AA:BB:CC:DD:EE:FF".into(),
        "Acme".into(),
        "Roadster".into(),
        "B".into(),
        "GT".into(),
        "red".into(),
        ssid.into(),
        passphrase.into(),
        "2024-03-14T10:00:00".into(),
        "75".into(),
        "img-01".into(),
        "17.5".into(),
    ];
    for f in &mut fields {
        f.push(b'\r');
    }
    fields
}

pub fn record_frames(pin: &str, ssid: &str, passphrase: &str) -> Vec<FrameBuf> {
    record_fields(pin, ssid, passphrase)
        .iter()
        .map(|f| data_frame(f))
        .collect()
}

// ── Recording sink ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Rig ───────────────────────────────────────────────────────

pub type SimPorts = PeripheralPorts<HmacAuthorizer, FileJournal, BleAdapter>;

#[allow(dead_code)]
pub struct Rig {
    pub service: ProvisioningService,
    pub io: SimPorts,
    pub sink: RecordingSink,
    pub jobs: Arc<JoinQueue>,
    pub outcomes: Arc<OutcomeQueue>,
    pub inbound: Arc<InboundQueue>,
    pub now_ms: u64,
    _dir: tempfile::TempDir,
}

#[allow(dead_code)]
impl Rig {
    pub fn new(config: ProvisioningConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = ProvisioningConfig {
            journal_dir: dir.path().to_string_lossy().into_owned(),
            ..config
        };
        let inbound = Arc::new(InboundQueue::new());
        let jobs = Arc::new(JoinQueue::new());
        let outcomes = Arc::new(OutcomeQueue::new());

        let io = PeripheralPorts {
            auth: HmacAuthorizer::from_config(&config),
            journal: FileJournal::open(&config.journal_dir).unwrap(),
            notify: BleAdapter::new(&config.device_name, inbound.clone()),
        };
        Self {
            service: ProvisioningService::new(config, jobs.clone(), outcomes.clone()),
            io,
            sink: RecordingSink::default(),
            jobs,
            outcomes,
            inbound,
            now_ms: 0,
            _dir: dir,
        }
    }

    pub fn event(&mut self, event: LinkEvent) -> Flow {
        self.now_ms += 10;
        self.service
            .handle_event(event, self.now_ms, &mut self.io, &mut self.sink)
    }

    pub fn connect_and_subscribe(&mut self) {
        self.event(LinkEvent::Connected);
        self.event(LinkEvent::Subscribed);
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.event(LinkEvent::write(bytes).unwrap());
    }

    pub fn write_all(&mut self, frames: &[FrameBuf]) {
        for f in frames {
            self.write(f);
        }
    }

    /// Feed whatever the simulated radio queued into the service.
    pub fn pump_radio(&mut self) {
        while let Ok(event) = self.inbound.try_receive() {
            self.event(event);
        }
    }

    pub fn sent(&mut self) -> Vec<Vec<u8>> {
        self.io.notify.take_sent()
    }

    pub fn journal(&self, file: &str) -> String {
        std::fs::read_to_string(self.io.journal.path(file)).unwrap_or_default()
    }

    pub fn queued_jobs(&self) -> Vec<NetworkJob> {
        let mut out = Vec::new();
        while let Ok(job) = self.jobs.try_receive() {
            out.push(job);
        }
        out
    }
}
