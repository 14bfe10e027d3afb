//! The async connection loop and the network worker running together, as
//! `main` wires them.

use std::sync::Arc;
use std::time::Duration;

use bleprov::adapters::time::MonotonicClock;
use bleprov::adapters::wifi::WifiAdapter;
use bleprov::app::commands::LinkEvent;
use bleprov::app::events::AppEvent;
use bleprov::config::ProvisioningConfig;
use bleprov::protocol::channels::{NetworkJob, offer};
use bleprov::protocol::codec::FrameBuf;
use bleprov::protocol::{io_task, network_task};

use crate::mock_ports::{Rig, numbered_frames, record_frames};

fn fast_config() -> ProvisioningConfig {
    ProvisioningConfig {
        idle_check_interval_ms: 50,
        ..Default::default()
    }
}

/// Send `Shutdown` to the loop after `delay`.
fn stop_after(rig: &Rig, delay: Duration) -> std::thread::JoinHandle<()> {
    let inbound = Arc::clone(&rig.inbound);
    std::thread::spawn(move || {
        std::thread::sleep(delay);
        futures_lite::future::block_on(inbound.send(LinkEvent::Shutdown));
    })
}

/// Push `frames` from another thread, blocking while the queue is full.
fn feed(rig: &Rig, frames: Vec<FrameBuf>) -> std::thread::JoinHandle<()> {
    let inbound = Arc::clone(&rig.inbound);
    std::thread::spawn(move || {
        for f in frames {
            futures_lite::future::block_on(inbound.send(LinkEvent::write(&f).unwrap()));
        }
    })
}

#[test]
fn join_outcome_flows_back_to_the_loop() {
    let mut rig = Rig::new(fast_config());
    let worker = network_task::spawn(
        WifiAdapter::new().with_unreachable("guest"),
        rig.jobs.clone(),
        rig.outcomes.clone(),
    )
    .unwrap();

    assert!(offer(&rig.inbound, LinkEvent::Connected));
    assert!(offer(&rig.inbound, LinkEvent::Subscribed));
    let stopper = stop_after(&rig, Duration::from_millis(600));
    let feeder = feed(&rig, record_frames("1234", "lab-net", "hunter2!"));

    let clock = MonotonicClock::new();
    io_task::run(
        &mut rig.service,
        &rig.inbound,
        &mut rig.io,
        &mut rig.sink,
        &clock,
    );
    feeder.join().unwrap();
    stopper.join().unwrap();

    futures_lite::future::block_on(rig.jobs.send(NetworkJob::Shutdown));
    worker.join().unwrap();

    assert_eq!(rig.service.records_completed(), 1);
    assert_eq!(rig.sent().len(), 1);
    assert!(rig.sink.events.contains(&AppEvent::NetworkJoined {
        ssid: "lab-net".into(),
        joined: true,
    }));
}

#[test]
fn unreachable_network_reports_failure() {
    let mut rig = Rig::new(fast_config());
    let worker = network_task::spawn(
        WifiAdapter::new().with_unreachable("guest"),
        rig.jobs.clone(),
        rig.outcomes.clone(),
    )
    .unwrap();

    let feeder = feed(&rig, record_frames("1234", "guest", "password1"));
    let stopper = stop_after(&rig, Duration::from_millis(600));

    let clock = MonotonicClock::new();
    io_task::run(
        &mut rig.service,
        &rig.inbound,
        &mut rig.io,
        &mut rig.sink,
        &clock,
    );
    feeder.join().unwrap();
    stopper.join().unwrap();
    futures_lite::future::block_on(rig.jobs.send(NetworkJob::Shutdown));
    worker.join().unwrap();

    assert!(rig.sink.events.contains(&AppEvent::NetworkJoined {
        ssid: "guest".into(),
        joined: false,
    }));
}

#[test]
fn zero_idle_timeout_keeps_partial_session() {
    let mut rig = Rig::new(ProvisioningConfig {
        session_idle_timeout_secs: 0,
        ..fast_config()
    });
    for f in numbered_frames(4) {
        assert!(offer(&rig.inbound, LinkEvent::write(&f).unwrap()));
    }
    let stopper = stop_after(&rig, Duration::from_millis(200));

    let clock = MonotonicClock::new();
    io_task::run(
        &mut rig.service,
        &rig.inbound,
        &mut rig.io,
        &mut rig.sink,
        &clock,
    );
    stopper.join().unwrap();

    assert!(
        rig.sink
            .events
            .iter()
            .all(|e| !matches!(e, AppEvent::SessionEvicted { .. })),
        "a zero timeout disables eviction"
    );
    assert_eq!(
        rig.service.session_state(),
        bleprov::protocol::session::SessionState::Accumulating(4)
    );
}
