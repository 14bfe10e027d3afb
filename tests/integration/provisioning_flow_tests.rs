//! End-to-end provisioning flow through the real authorizer, a temp-dir
//! journal and the simulated BLE adapter.

use bleprov::adapters::authorizer::{STATUS_AUTHORIZED, STATUS_DENIED};
use bleprov::adapters::journal::{FRAME_JOURNAL, MAC_JOURNAL, RECORD_JOURNAL};
use bleprov::app::commands::LinkEvent;
use bleprov::app::events::AppEvent;
use bleprov::app::ports::EventSink;
use bleprov::config::ProvisioningConfig;
use bleprov::diagnostics::LinkStats;
use bleprov::protocol::channels::NetworkJob;
use bleprov::protocol::codec::{FrameError, PacketKind, extract};
use bleprov::protocol::record::FieldCount;
use bleprov::protocol::session::SessionState;
use bleprov::protocol::transport::SendOutcome;

use crate::mock_ports::{Rig, data_frame, numbered_frames, record_frames};

// ── Happy path ────────────────────────────────────────────────

#[test]
fn seventeen_frames_produce_one_record_and_one_response() {
    let mut rig = Rig::new(ProvisioningConfig::default());
    rig.connect_and_subscribe();
    rig.write_all(&numbered_frames(17));

    assert_eq!(rig.service.records_completed(), 1);
    assert_eq!(rig.service.session_state(), SessionState::Idle);

    let sent = rig.sent();
    assert_eq!(sent.len(), 1, "exactly one notify per record");
    let reply = extract(&sent[0]).unwrap();
    assert_eq!(reply.kind, PacketKind::Ack);
    assert_eq!(reply.payload[0], STATUS_AUTHORIZED);

    assert_eq!(rig.journal(FRAME_JOURNAL).lines().count(), 17);
    let report = rig.journal(RECORD_JOURNAL);
    assert!(report.starts_with("Device PIN: \u{1}\n"));
    assert!(report.ends_with("\n\n"));
    assert!(rig.journal(MAC_JOURNAL).is_empty());
}

#[test]
fn frame_journal_holds_hex_of_raw_writes() {
    let mut rig = Rig::new(ProvisioningConfig::default());
    let f = data_frame(b"abc");
    rig.write(&f);
    assert_eq!(rig.journal(FRAME_JOURNAL), format!("{}\n", hex::encode(&f)));
}

#[test]
fn credentials_are_trimmed_and_queued_for_join() {
    let mut rig = Rig::new(ProvisioningConfig::default());
    rig.connect_and_subscribe();
    rig.write_all(&record_frames("1234", "lab-net", "hunter2!"));

    assert_eq!(
        rig.queued_jobs(),
        vec![NetworkJob::Join {
            ssid: "lab-net".into(),
            passphrase: "hunter2!".into(),
        }]
    );
    assert!(
        rig.sink
            .events
            .contains(&AppEvent::NetworkRequested { ssid: "lab-net".into() })
    );
}

#[test]
fn wrong_pin_is_denied_but_still_answered() {
    let mut rig = Rig::new(ProvisioningConfig {
        expected_pin: Some("9999".into()),
        ..Default::default()
    });
    rig.connect_and_subscribe();
    rig.write_all(&record_frames("1234", "lab-net", "hunter2!"));

    let sent = rig.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(extract(&sent[0]).unwrap().payload[0], STATUS_DENIED);
    assert!(
        rig.sink
            .events
            .contains(&AppEvent::Authorization { authorized: false })
    );
}

// ── Malformed input ───────────────────────────────────────────

#[test]
fn malformed_frame_is_dropped_without_disturbing_the_session() {
    let mut rig = Rig::new(ProvisioningConfig::default());
    rig.connect_and_subscribe();

    let frames = numbered_frames(17);
    rig.write_all(&frames[..5]);

    let mut corrupt = frames[5].clone();
    corrupt[9] ^= 0xFF;
    rig.write(&corrupt);

    assert_eq!(rig.service.session_state(), SessionState::Accumulating(5));
    assert!(rig.sent().is_empty(), "no reply by default");
    assert_eq!(rig.journal(FRAME_JOURNAL).lines().count(), 5);
    assert!(
        rig.sink
            .events
            .contains(&AppEvent::FrameRejected(FrameError::ChecksumMismatch))
    );

    rig.write_all(&frames[5..]);
    assert_eq!(rig.service.records_completed(), 1);
}

#[test]
fn malformed_frame_can_be_nacked() {
    let mut rig = Rig::new(ProvisioningConfig {
        nack_malformed: true,
        ..Default::default()
    });
    rig.connect_and_subscribe();
    rig.write(&[0x00; 4]);

    let sent = rig.sent();
    assert_eq!(sent.len(), 1);
    let nack = extract(&sent[0]).unwrap();
    assert_eq!(nack.kind, PacketKind::Nack);
    assert_eq!(&nack.payload[..], &[FrameError::TooShort.code()]);
}

// ── Subscription gating ───────────────────────────────────────

#[test]
fn response_is_suppressed_without_subscription() {
    let mut rig = Rig::new(ProvisioningConfig::default());
    let mut stats = LinkStats::new();
    rig.event(LinkEvent::Connected);
    rig.write_all(&numbered_frames(17));

    assert_eq!(rig.service.records_completed(), 1);
    assert!(rig.sent().is_empty());
    for e in &rig.sink.events {
        stats.emit(e);
    }
    assert_eq!(stats.responses_suppressed, 1);
    assert_eq!(stats.responses_sent, 0);
}

#[test]
fn unsubscribe_mid_session_silences_the_reply() {
    let mut rig = Rig::new(ProvisioningConfig::default());
    rig.connect_and_subscribe();
    let frames = numbered_frames(17);
    rig.write_all(&frames[..10]);
    rig.event(LinkEvent::Unsubscribed);
    rig.write_all(&frames[10..]);

    assert!(rig.sent().is_empty());
    assert!(
        rig.sink
            .events
            .contains(&AppEvent::Response(SendOutcome::Suppressed))
    );
}

// ── Session boundaries ────────────────────────────────────────

#[test]
fn consecutive_records_do_not_share_fragments() {
    let mut rig = Rig::new(ProvisioningConfig::default());
    rig.connect_and_subscribe();
    rig.write_all(&numbered_frames(17));
    rig.write_all(&numbered_frames(17));
    rig.write(&data_frame(&[0x42]));

    assert_eq!(rig.service.records_completed(), 2);
    assert_eq!(rig.sent().len(), 2);
    assert_eq!(rig.service.session_state(), SessionState::Accumulating(1));
    assert_eq!(rig.journal(RECORD_JOURNAL).matches("Device PIN: ").count(), 2);
}

#[test]
fn disconnect_discards_partial_session() {
    let mut rig = Rig::new(ProvisioningConfig::default());
    rig.connect_and_subscribe();
    rig.write_all(&numbered_frames(9));
    rig.event(LinkEvent::Disconnected);

    assert!(
        rig.sink
            .events
            .contains(&AppEvent::PeerDisconnected { discarded: 9 })
    );

    rig.connect_and_subscribe();
    rig.write_all(&numbered_frames(17)[..8]);
    assert_eq!(rig.service.records_completed(), 0);
    assert_eq!(rig.service.session_state(), SessionState::Accumulating(8));
}

#[test]
fn eighteen_field_sessions_journal_the_peer_mac() {
    let mut rig = Rig::new(ProvisioningConfig {
        field_count: FieldCount::Eighteen,
        ..Default::default()
    });
    rig.connect_and_subscribe();
    rig.write_all(&numbered_frames(17));
    assert_eq!(rig.service.records_completed(), 0);

    rig.write(&data_frame(b"11:22:33:44:55:66\r"));
    assert_eq!(rig.service.records_completed(), 1);
    assert_eq!(
        rig.journal(MAC_JOURNAL),
        "Saved bluetooth Mac address: 11:22:33:44:55:66\n"
    );
}

#[test]
fn fragment_acks_precede_the_record_response() {
    let mut rig = Rig::new(ProvisioningConfig {
        ack_fragments: true,
        ..Default::default()
    });
    rig.connect_and_subscribe();
    rig.write_all(&numbered_frames(17));

    let sent = rig.sent();
    assert_eq!(sent.len(), 18);
    let first = extract(&sent[0]).unwrap();
    assert_eq!(&first.payload[..], &[PacketKind::Data.to_u8(), 0x00, 0x01]);
}

// ── Radio and console ─────────────────────────────────────────

#[test]
fn simulated_radio_callbacks_drive_the_service() {
    let mut rig = Rig::new(ProvisioningConfig::default());
    rig.io.notify.on_central_connected();
    rig.io.notify.on_cccd_write(&[0x01, 0x00]).unwrap();
    for f in numbered_frames(8) {
        rig.io.notify.on_rx_write(&f).unwrap();
    }
    rig.pump_radio();
    assert!(rig.service.is_notifying());
    for f in &numbered_frames(17)[8..] {
        rig.io.notify.on_rx_write(f).unwrap();
    }
    rig.pump_radio();

    assert_eq!(rig.service.records_completed(), 1);
    assert_eq!(rig.sent().len(), 1);
}

#[test]
fn oversized_radio_write_is_rejected_and_nacked() {
    let mut rig = Rig::new(ProvisioningConfig {
        nack_malformed: true,
        ..Default::default()
    });
    rig.connect_and_subscribe();
    rig.io.notify.on_rx_write(&[0x24; 300]).unwrap();
    rig.pump_radio();

    assert_eq!(
        rig.sink
            .count(|e| *e == AppEvent::FrameRejected(FrameError::LengthMismatch)),
        1
    );
    let sent = rig.sent();
    assert_eq!(sent.len(), 1);
    let nack = extract(&sent[0]).unwrap();
    assert_eq!(nack.kind, PacketKind::Nack);
    assert_eq!(rig.service.session_state(), SessionState::Idle);
}

#[test]
fn burst_beyond_queue_depth_is_refused_then_retried() {
    let mut rig = Rig::new(ProvisioningConfig::default());
    rig.connect_and_subscribe();

    let frames = numbered_frames(17);
    let mut refused = Vec::new();
    for f in &frames {
        if rig.io.notify.on_rx_write(f).is_err() {
            refused.push(f.clone());
        }
    }
    assert_eq!(refused.len(), 1, "the seventeenth write finds the queue full");
    rig.pump_radio();
    assert_eq!(rig.service.session_state(), SessionState::Accumulating(16));

    for f in &refused {
        rig.io.notify.on_rx_write(f).unwrap();
    }
    rig.pump_radio();
    assert_eq!(rig.service.records_completed(), 1);
    assert_eq!(rig.sent().len(), 1);
}

#[test]
fn disconnect_on_a_full_queue_still_discards_the_session() {
    let mut rig = Rig::new(ProvisioningConfig::default());
    rig.connect_and_subscribe();
    for f in &numbered_frames(16) {
        rig.io.notify.on_rx_write(f).unwrap();
    }
    rig.io.notify.on_central_disconnected();
    rig.pump_radio();

    assert_eq!(rig.service.session_state(), SessionState::Idle);
    assert!(rig
        .sink
        .events
        .contains(&AppEvent::PeerDisconnected { discarded: 16 }));
}

#[test]
fn console_trigger_sends_canned_reply() {
    let mut rig = Rig::new(ProvisioningConfig::default());
    rig.connect_and_subscribe();
    rig.event(LinkEvent::console("specific message"));
    rig.event(LinkEvent::console("   "));
    rig.event(LinkEvent::console("hello"));

    assert_eq!(
        rig.sent(),
        vec![b"Predefined message".to_vec(), b"hello".to_vec()]
    );
}
