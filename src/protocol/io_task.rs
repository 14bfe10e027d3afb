//! Async connection loop: the single consumer of inbound link events.
//!
//! Runs one [`ProvisioningService`] under an `edge-executor` driven by
//! `futures-lite::block_on`. Each iteration races the inbound queue against
//! an `async-io-mini` reactor timer armed for a fixed deadline; the timer arm
//! runs idle housekeeping (session eviction, join outcome reporting). The
//! deadline survives across events, and a busy queue runs the housekeeping
//! inline once the deadline has passed, so traffic cannot starve it.
//!
//! ```text
//!  ┌──────────────────────────────────────────────────────┐
//!  │  connection thread                                   │
//!  │  ┌────────────────────────────────────────────────┐  │
//!  │  │  LocalExecutor                                 │  │
//!  │  │   or( inbound.receive() , Timer::at(next) )    │  │
//!  │  │        │ event                │ elapsed        │  │
//!  │  │        ▼                      ▼                │  │
//!  │  │   handle_event          on_idle_tick           │  │
//!  │  └────────────────────────────────────────────────┘  │
//!  └──────────────────────────────────────────────────────┘
//! ```

use core::time::Duration;
use std::time::Instant;

use futures_lite::future;
use log::info;

use crate::app::commands::LinkEvent;
use crate::app::ports::{AuthorizationPort, ClockPort, EventSink, JournalPort, NotifyPort};
use crate::app::service::{Flow, ProvisioningService};

use super::channels::InboundQueue;

enum Wake {
    Event(LinkEvent),
    Tick,
}

/// Serve inbound events until a [`LinkEvent::Shutdown`] arrives.
pub async fn connection_loop(
    service: &mut ProvisioningService,
    inbound: &InboundQueue,
    io: &mut (impl AuthorizationPort + JournalPort + NotifyPort),
    sink: &mut impl EventSink,
    clock: &impl ClockPort,
) {
    let tick = Duration::from_millis(u64::from(service.config().idle_check_interval_ms));
    let mut next_tick = Instant::now() + tick;

    loop {
        let wake = future::or(async { Wake::Event(inbound.receive().await) }, async {
            async_io_mini::Timer::at(next_tick).await;
            Wake::Tick
        })
        .await;

        if let Wake::Event(event) = wake {
            if service.handle_event(event, clock.now_ms(), io, sink) == Flow::Stop {
                break;
            }
        }

        let now = Instant::now();
        if now >= next_tick {
            service.on_idle_tick(clock.now_ms(), sink);
            next_tick = advance(next_tick, tick, now);
        }
    }
}

/// Next deadline after `now`, keeping the original phase.
fn advance(deadline: Instant, tick: Duration, now: Instant) -> Instant {
    let mut next = deadline + tick;
    if next <= now {
        next = now + tick;
    }
    next
}

/// Drive [`connection_loop`] to completion on the calling thread.
pub fn run(
    service: &mut ProvisioningService,
    inbound: &InboundQueue,
    io: &mut (impl AuthorizationPort + JournalPort + NotifyPort),
    sink: &mut impl EventSink,
    clock: &impl ClockPort,
) {
    let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();

    info!(
        "IO: connection loop started (idle check {} ms)",
        service.config().idle_check_interval_ms
    );
    future::block_on(executor.run(connection_loop(service, inbound, io, sink, clock)));
    info!("IO: connection loop stopped");
}

// ── Tests ────────────────────────────────────────────────────
