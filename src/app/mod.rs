//! Application core: provisioning rules with no direct I/O.
//!
//! [`service::ProvisioningService`] owns the reassembly session and the
//! notify gate for one connection. Everything it touches outside itself
//! goes through the **port traits** in [`ports`], so the whole flow runs
//! against mocks in tests.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
