//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter      | Implements         | Connects to                   |
//! |--------------|--------------------|-------------------------------|
//! | `authorizer` | AuthorizationPort  | HMAC-SHA256 over record fields|
//! | `ble`        | NotifyPort         | Bluedroid GATT server         |
//! |              | (LinkEvent source) |                               |
//! | `console`    | (LinkEvent source) | stdin                         |
//! | `journal`    | JournalPort        | append-only text files        |
//! | `log_sink`   | EventSink          | `log` facade                  |
//! | `nvs`        | ConfigPort         | NVS / in-memory store         |
//! | `time`       | ClockPort          | ESP32 system timer / Instant  |
//! | `wifi`       | NetworkPort        | ESP-IDF WiFi STA              |

pub mod authorizer;
pub mod ble;
pub mod console;
pub mod journal;
pub mod log_sink;
pub mod nvs;
pub mod time;
pub(crate) mod utils;
pub mod wifi;
