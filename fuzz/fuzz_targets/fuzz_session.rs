//! Fuzz target: provisioning service under arbitrary write sequences
//!
//! Splits the input into writes and drives them through a
//! `ProvisioningService` with inert ports. The session must never hold
//! more than N fragments and the service must never panic.
//!
//! cargo fuzz run fuzz_session

#![no_main]

use std::sync::Arc;

use bleprov::app::commands::LinkEvent;
use bleprov::app::events::AppEvent;
use bleprov::app::ports::{
    AuthDecision, AuthError, AuthorizationPort, BleError, EventSink, JournalPort, NotifyPort,
    StorageError,
};
use bleprov::app::service::ProvisioningService;
use bleprov::config::ProvisioningConfig;
use bleprov::protocol::channels::{JoinQueue, OutcomeQueue};
use bleprov::protocol::record::{FieldCount, ProvisioningRecord};
use bleprov::protocol::session::SessionState;
use libfuzzer_sys::fuzz_target;

struct Inert;

impl NotifyPort for Inert {
    fn notify(&mut self, _bytes: &[u8]) -> Result<(), BleError> {
        Ok(())
    }
}

impl JournalPort for Inert {
    fn append_frame(&mut self, _: &str) -> Result<(), StorageError> {
        Ok(())
    }
    fn append_record(&mut self, _: &str) -> Result<(), StorageError> {
        Ok(())
    }
    fn append_peer_mac(&mut self, _: &str) -> Result<(), StorageError> {
        Ok(())
    }
}

impl AuthorizationPort for Inert {
    fn decide(&mut self, _: &ProvisioningRecord) -> Result<AuthDecision, AuthError> {
        Ok(AuthDecision {
            authorized: true,
            response_hex: "2423".into(),
        })
    }
}

struct Discard;

impl EventSink for Discard {
    fn emit(&mut self, _: &AppEvent) {}
}

fuzz_target!(|data: &[u8]| {
    let Some((&selector, rest)) = data.split_first() else {
        return;
    };
    let field_count = if selector & 1 == 0 {
        FieldCount::Seventeen
    } else {
        FieldCount::Eighteen
    };
    let config = ProvisioningConfig {
        field_count,
        nack_malformed: selector & 2 != 0,
        ..Default::default()
    };
    let mut service = ProvisioningService::new(
        config,
        Arc::new(JoinQueue::new()),
        Arc::new(OutcomeQueue::new()),
    );
    let mut io = Inert;
    let mut sink = Discard;

    service.handle_event(LinkEvent::Subscribed, 0, &mut io, &mut sink);

    // Each chunk is `len, bytes...`; a zero length toggles the link.
    let mut cursor = rest;
    let mut now = 0u64;
    while let Some((&len, tail)) = cursor.split_first() {
        now += 1;
        let take = usize::from(len).min(tail.len());
        let (chunk, next) = tail.split_at(take);
        cursor = next;

        let event = if len == 0 {
            LinkEvent::Disconnected
        } else {
            LinkEvent::received(chunk)
        };
        service.handle_event(event, now, &mut io, &mut sink);

        if let SessionState::Accumulating(n) = service.session_state() {
            assert!(n < field_count.get());
        }
        assert_ne!(service.session_state(), SessionState::Complete);
    }
});
