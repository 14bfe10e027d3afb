//! BLE provisioning peripheral: main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │                                                              │
//! │  BleAdapter      Console       FileJournal   HmacAuthorizer  │
//! │  (Notify, RX)    (stdin)       (Journal)     (Authorization) │
//! │  WifiAdapter     NvsAdapter    LogEventSink  MonotonicClock  │
//! │  (Network)       (Config)      (EventSink)   (Clock)         │
//! │                                                              │
//! │  ─────────────── Port Trait Boundary ──────────────────      │
//! │                                                              │
//! │  ┌──────────────────────────────┐   ┌────────────────────┐   │
//! │  │ connection loop (main thread)│──▶│ net-worker thread  │   │
//! │  │ ProvisioningService          │◀──│ NetworkPort::join  │   │
//! │  └──────────────────────────────┘   └────────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::Arc;

use anyhow::{Result, anyhow};
use log::{info, warn};

use bleprov::adapters::authorizer::HmacAuthorizer;
use bleprov::adapters::ble::BleAdapter;
use bleprov::adapters::journal::FileJournal;
use bleprov::adapters::log_sink::LogEventSink;
use bleprov::adapters::nvs::NvsAdapter;
use bleprov::adapters::time::MonotonicClock;
use bleprov::adapters::wifi::WifiAdapter;
use bleprov::app::ports::{ConfigPort, PeripheralPorts};
use bleprov::app::service::ProvisioningService;
use bleprov::config::ProvisioningConfig;
use bleprov::diagnostics::{self, LinkStats};
use bleprov::protocol::channels::{InboundQueue, JoinQueue, NetworkJob, OutcomeQueue};
use bleprov::protocol::{io_task, network_task};

fn main() -> Result<()> {
    // ── 1. Logging ────────────────────────────────────────────
    #[cfg(target_os = "espidf")]
    {
        esp_idf_svc::sys::link_patches();
        esp_idf_logger::init()?;
    }
    #[cfg(not(target_os = "espidf"))]
    {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    diagnostics::install_panic_handler();
    info!("bleprov v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Config ─────────────────────────────────────────────
    let config = load_config()?;
    info!(
        "Config: name='{}' fields={} idle_timeout={}s",
        config.device_name,
        config.field_count.get(),
        config.session_idle_timeout_secs
    );

    // ── 3. Channels ───────────────────────────────────────────
    let inbound = Arc::new(InboundQueue::new());
    let jobs = Arc::new(JoinQueue::new());
    let outcomes = Arc::new(OutcomeQueue::new());

    // ── 4. Network worker ─────────────────────────────────────
    let worker = network_task::spawn(make_wifi()?, jobs.clone(), outcomes.clone())?;

    // ── 5. Adapters ───────────────────────────────────────────
    let journal = FileJournal::open(&config.journal_dir).map_err(bleprov::Error::from)?;
    let auth = HmacAuthorizer::from_config(&config);
    if config.psk_bytes().is_none() {
        warn!("Config: auth_psk unset, response tags use an all-zero key");
    }

    let mut ble = BleAdapter::new(&config.device_name, inbound.clone());
    ble.start().map_err(bleprov::Error::from)?;

    // UART stdin on the device reports EOF when idle, so the console is host-only.
    #[cfg(not(target_os = "espidf"))]
    {
        bleprov::adapters::console::spawn(inbound.clone())?;
    }

    let mut io = PeripheralPorts {
        auth,
        journal,
        notify: ble,
    };

    // ── 6. Connection loop ────────────────────────────────────
    let mut service = ProvisioningService::new(config, jobs.clone(), outcomes);
    let mut sink = (LogEventSink::new(), LinkStats::new());
    let clock = MonotonicClock::new();

    io_task::run(&mut service, &inbound, &mut io, &mut sink, &clock);

    // ── 7. Shutdown ───────────────────────────────────────────
    io.notify.stop();
    futures_lite::future::block_on(jobs.send(NetworkJob::Shutdown));
    worker
        .join()
        .map_err(|_| anyhow!("network worker panicked"))?;

    let stats = sink
        .1
        .to_json()
        .map_err(|e| anyhow!("stats export failed: {}", e))?;
    info!("Done: {} record(s), stats {}", service.records_completed(), stats);
    Ok(())
}

/// Host: a JSON file named on the command line wins over the store.
fn load_config() -> Result<ProvisioningConfig> {
    #[cfg(not(target_os = "espidf"))]
    {
        if let Some(path) = std::env::args().nth(1) {
            let text = std::fs::read_to_string(&path)?;
            let config = ProvisioningConfig::from_json(&text).map_err(bleprov::Error::from)?;
            info!("Config loaded from {}", path);
            return Ok(config);
        }
    }

    let nvs = match NvsAdapter::new() {
        Ok(nvs) => nvs,
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults", e);
            return Ok(ProvisioningConfig::default());
        }
    };
    Ok(match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            ProvisioningConfig::default()
        }
    })
}

#[cfg(target_os = "espidf")]
fn make_wifi() -> Result<WifiAdapter> {
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::peripherals::Peripherals;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let wifi = BlockingWifi::wrap(
        EspWifi::new(peripherals.modem, sysloop.clone(), Some(nvs))?,
        sysloop,
    )?;
    Ok(WifiAdapter::new(wifi))
}

#[cfg(not(target_os = "espidf"))]
fn make_wifi() -> Result<WifiAdapter> {
    Ok(WifiAdapter::new())
}
