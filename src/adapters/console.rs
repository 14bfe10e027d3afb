//! Admin console on stdin.
//!
//! A reader thread turns each line into a [`LinkEvent`] on the connection's
//! inbound queue. Plain lines become [`LinkEvent::Console`]; the service
//! decides what to send. A few directives drive the link by hand:
//!
//! | Line             | Event                         |
//! |------------------|-------------------------------|
//! | `write <hex>`    | `Write(bytes)`                |
//! | `!connect`       | `Connected`                   |
//! | `!disconnect`    | `Disconnected`                |
//! | `!subscribe`     | `Subscribed`                  |
//! | `!unsubscribe`   | `Unsubscribed`                |
//! | `!quit`, EOF     | `Shutdown`                    |

use std::io::BufRead;
use std::sync::Arc;
use std::thread::JoinHandle;

use futures_lite::future;
use log::{info, warn};

use crate::app::commands::LinkEvent;
use crate::protocol::channels::InboundQueue;

const WRITE_PREFIX: &str = "write ";

/// Map one console line to an event. `None` when a `write` carries bad hex.
pub fn parse_line(line: &str) -> Option<LinkEvent> {
    let line = line.trim_end_matches(['\r', '\n']);

    if let Some(hex_text) = line.strip_prefix(WRITE_PREFIX) {
        let bytes = match hex::decode(hex_text.trim()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("CONSOLE: bad hex in write: {}", e);
                return None;
            }
        };
        return Some(LinkEvent::received(&bytes));
    }

    match line.trim() {
        "!connect" => Some(LinkEvent::Connected),
        "!disconnect" => Some(LinkEvent::Disconnected),
        "!subscribe" => Some(LinkEvent::Subscribed),
        "!unsubscribe" => Some(LinkEvent::Unsubscribed),
        "!quit" => Some(LinkEvent::Shutdown),
        _ => Some(LinkEvent::console(line)),
    }
}

/// Feed every line of `input` onto `inbound`, then a final `Shutdown`.
///
/// Blocks while the queue is full so console bursts are never dropped.
pub fn pump(input: impl BufRead, inbound: &InboundQueue) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("CONSOLE: read failed: {}", e);
                break;
            }
        };
        let Some(event) = parse_line(&line) else {
            continue;
        };
        let stop = event == LinkEvent::Shutdown;
        future::block_on(inbound.send(event));
        if stop {
            return;
        }
    }
    future::block_on(inbound.send(LinkEvent::Shutdown));
}

/// Read stdin on a detached thread.
pub fn spawn(inbound: Arc<InboundQueue>) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            info!("CONSOLE: reading stdin");
            pump(std::io::stdin().lock(), &inbound);
            info!("CONSOLE: input closed");
        })
}
