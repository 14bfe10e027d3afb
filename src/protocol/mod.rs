//! Provisioning protocol: wire codec, record reassembly and the tasks that
//! move frames between the radio and the core.
//!
//! | Module         | Role                                        |
//! |----------------|---------------------------------------------|
//! | `codec`        | Frame encode / validate / extract           |
//! | `record`       | Positional provisioning record              |
//! | `session`      | Per-connection fragment accumulator         |
//! | `transport`    | Notify subscription gate                    |
//! | `channels`     | `embassy-sync` queues between tasks         |
//! | `io_task`      | Async connection loop                       |
//! | `network_task` | Wi-Fi join worker thread                    |

pub mod channels;
pub mod codec;
pub mod io_task;
pub mod network_task;
pub mod record;
pub mod session;
pub mod transport;
