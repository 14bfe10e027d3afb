//! Provisioning peripheral configuration.
//!
//! All tunable parameters of the BLE provisioning service. Persisted as a
//! postcard blob through [`ConfigPort`](crate::app::ports::ConfigPort), or
//! read from a JSON file on host builds.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::protocol::record::FieldCount;

/// Core provisioning configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningConfig {
    // --- Radio ---
    /// Advertised GAP name
    pub device_name: String,

    // --- Session ---
    /// Fragments per provisioning record (17 or 18)
    pub field_count: FieldCount,
    /// Discard a partial session after this many idle seconds (0 = never)
    pub session_idle_timeout_secs: u32,
    /// How often the connection loop checks for idle sessions (milliseconds)
    pub idle_check_interval_ms: u32,

    // --- Responses ---
    /// Answer malformed writes with a Nack frame instead of silence
    pub nack_malformed: bool,
    /// Send the authorizer's per-fragment reply after every accepted frame
    pub ack_fragments: bool,

    // --- Authorization ---
    /// Device PIN the record must carry; `None` authorizes every record
    pub expected_pin: Option<String>,
    /// Hex-encoded 32-byte key for response tags (empty = unkeyed)
    pub auth_psk: String,

    // --- Persistence ---
    /// Directory holding the frame, record and MAC journals
    pub journal_dir: String,

    // --- Console ---
    /// Console line that triggers the canned reply
    pub console_trigger: String,
    /// Canned reply text
    pub console_reply: String,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            device_name: "rpi-gatt-server".into(),

            field_count: FieldCount::Seventeen,
            session_idle_timeout_secs: 120,
            idle_check_interval_ms: 1000,

            nack_malformed: false,
            ack_fragments: false,

            expected_pin: None,
            auth_psk: String::new(),

            journal_dir: ".".into(),

            console_trigger: "specific message".into(),
            console_reply: "Predefined message".into(),
        }
    }
}

impl ProvisioningConfig {
    /// Range-check every field. Rejects, never clamps.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_name.is_empty() || self.device_name.len() > 29 {
            return Err(ConfigError::ValidationFailed(
                "device_name must be 1–29 bytes",
            ));
        }
        if self.session_idle_timeout_secs > 3600 {
            return Err(ConfigError::ValidationFailed(
                "session_idle_timeout_secs must be 0–3600",
            ));
        }
        if !(50..=60_000).contains(&self.idle_check_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "idle_check_interval_ms must be 50–60000",
            ));
        }
        if !self.auth_psk.is_empty() && self.psk_bytes().is_none() {
            return Err(ConfigError::ValidationFailed(
                "auth_psk must be empty or 64 hex digits",
            ));
        }
        if self.expected_pin.as_deref() == Some("") {
            return Err(ConfigError::ValidationFailed(
                "expected_pin must not be empty when set",
            ));
        }
        if self.journal_dir.is_empty() {
            return Err(ConfigError::ValidationFailed("journal_dir must be set"));
        }
        if self.console_trigger.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "console_trigger must not be blank",
            ));
        }
        Ok(())
    }

    /// Decoded PSK, `None` if not exactly 32 hex-encoded bytes.
    pub fn psk_bytes(&self) -> Option<[u8; 32]> {
        let mut out = [0u8; 32];
        hex::decode_to_slice(&self.auth_psk, &mut out).ok()?;
        Some(out)
    }

    pub fn session_idle_timeout_ms(&self) -> u64 {
        u64::from(self.session_idle_timeout_secs) * 1000
    }

    /// Parse and validate a JSON document. Missing keys take defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(text).map_err(|_| ConfigError::Corrupted)?;
        cfg.validate()?;
        Ok(cfg)
    }
}
