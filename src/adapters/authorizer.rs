//! Default authorization collaborator.
//!
//! Authorizes a record when its device PIN matches the configured one (or
//! unconditionally when none is configured) and answers with an `Ack`
//! frame the companion app can verify:
//!
//! ```text
//!   payload = [ status ] ++ HMAC-SHA256(psk, pin ‖ user_id ‖ device_mac)[..16]
//!   status  = 0x01 authorized, 0x00 denied
//! ```
//!
//! The frame is returned hex-encoded, which is the contract the core
//! expects from any authorizer.

use log::{debug, info};

use crate::app::ports::{AuthDecision, AuthError, AuthorizationPort};
use crate::protocol::codec::{self, DecodedFrame, PacketKind};
use crate::protocol::record::{ProvisioningRecord, trim_cr};

/// Truncated tag length carried in the response payload.
pub const TAG_LEN: usize = 16;

pub const STATUS_AUTHORIZED: u8 = 0x01;
pub const STATUS_DENIED: u8 = 0x00;

pub struct HmacAuthorizer {
    expected_pin: Option<String>,
    psk: [u8; 32],
}

impl HmacAuthorizer {
    pub fn new(expected_pin: Option<String>, psk: [u8; 32]) -> Self {
        Self { expected_pin, psk }
    }

    /// Build from config; an unset PSK keys the tag with zeros.
    pub fn from_config(config: &crate::config::ProvisioningConfig) -> Self {
        Self::new(
            config.expected_pin.clone(),
            config.psk_bytes().unwrap_or([0u8; 32]),
        )
    }

    /// Truncated record tag.
    pub fn tag(&self, record: &ProvisioningRecord) -> [u8; TAG_LEN] {
        let mut mac = hmac_sha256::HMAC::new(self.psk);
        mac.update(trim_cr(&record.device_pin).as_bytes());
        mac.update(trim_cr(&record.user_id).as_bytes());
        mac.update(trim_cr(&record.device_mac).as_bytes());
        let full = mac.finalize();
        let mut out = [0u8; TAG_LEN];
        out.copy_from_slice(&full[..TAG_LEN]);
        out
    }

    fn pin_matches(&self, record: &ProvisioningRecord) -> bool {
        match &self.expected_pin {
            None => true,
            Some(expected) => record.device_pin_text() == *expected,
        }
    }
}

impl AuthorizationPort for HmacAuthorizer {
    fn decide(&mut self, record: &ProvisioningRecord) -> Result<AuthDecision, AuthError> {
        if record.device_pin.is_empty() {
            return Err(AuthError::InvalidRecord("empty device PIN"));
        }

        let authorized = self.pin_matches(record);
        let status = if authorized {
            STATUS_AUTHORIZED
        } else {
            STATUS_DENIED
        };

        let mut payload = [0u8; 1 + TAG_LEN];
        payload[0] = status;
        payload[1..].copy_from_slice(&self.tag(record));

        // 17 bytes is always within the 255-byte payload limit.
        let frame = codec::encode(PacketKind::Ack, &payload)
            .map_err(|_| AuthError::Unavailable)?;
        info!("AUTH: record for user '{}' authorized={}", trim_cr(&record.user_id), authorized);

        Ok(AuthDecision {
            authorized,
            response_hex: hex::encode(&frame),
        })
    }

    /// `Ack` echoing the fragment's kind and checksum.
    fn acknowledge(&mut self, frame: &DecodedFrame) -> Option<String> {
        let [hi, lo] = frame.checksum.to_be_bytes();
        let ack = codec::encode(PacketKind::Ack, &[frame.kind.to_u8(), hi, lo]).ok()?;
        debug!("AUTH: fragment ack for checksum {:#06x}", frame.checksum);
        Some(hex::encode(&ack))
    }
}
