//! BLE provisioning peripheral library.
//!
//! Exposes the protocol core, the port traits and the adapters for
//! integration testing. ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod protocol;

pub use error::{Error, Result};
