//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock or simulation adapters. All tests run on the host with no
//! radio required.

mod connection_loop_tests;
mod mock_ports;
mod provisioning_flow_tests;
