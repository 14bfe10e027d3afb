//! Positional provisioning record assembled from a completed session.
//!
//! Field order is fixed by the companion app: fragment *i* of the session
//! becomes field *i* below, regardless of the packet kind it travelled in.

use core::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};

use super::codec::Payload;

/// Completion threshold. Both observed peer builds are valid targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FieldCount {
    /// Record ends at efficiency/mileage; no peer MAC.
    #[default]
    Seventeen,
    /// Field 18 carries the peer Bluetooth MAC.
    Eighteen,
}

impl FieldCount {
    pub const fn get(self) -> usize {
        match self {
            Self::Seventeen => 17,
            Self::Eighteen => 18,
        }
    }
}

/// Upper bound across all configurations.
pub const MAX_FIELDS: usize = 18;

/// Human labels in positional order, used by the record report.
pub const FIELD_LABELS: [&str; MAX_FIELDS] = [
    "Device PIN",
    "User ID",
    "User Rights",
    "User Name",
    "User Email",
    "Device MAC",
    "Vehicle Manufacturer",
    "Vehicle Model",
    "Vehicle Class",
    "Vehicle Variant",
    "Vehicle Color",
    "WiFi SSID",
    "WiFi Password",
    "Timestamp",
    "Battery Capacity",
    "Vehicle Image",
    "Efficiency/Mileage",
    "Peer MAC",
];

/// SSID/passphrase pair lifted out of a record, carriage returns removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiCredentials {
    pub ssid: String,
    pub passphrase: String,
}

/// The fully assembled configuration record.
///
/// Fields hold raw fragment bytes; text views are produced on demand
/// with lossy UTF-8 so a malformed field never blocks the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningRecord {
    pub device_pin: Payload,
    pub user_id: Payload,
    pub user_rights: Payload,
    pub user_name: Payload,
    pub user_email: Payload,
    pub device_mac: Payload,
    pub vehicle_manufacturer: Payload,
    pub vehicle_model: Payload,
    pub vehicle_class: Payload,
    pub vehicle_variant: Payload,
    pub vehicle_color: Payload,
    pub wifi_ssid: Payload,
    pub wifi_passphrase: Payload,
    pub timestamp: Payload,
    pub battery_capacity: Payload,
    pub vehicle_image: Payload,
    pub efficiency: Payload,
    pub peer_mac: Option<Payload>,
}

impl ProvisioningRecord {
    /// Build from fragments in arrival order.
    ///
    /// Returns `None` unless `fragments.len()` equals `count`.
    pub fn from_fragments(fragments: &[Payload], count: FieldCount) -> Option<Self> {
        if fragments.len() != count.get() {
            return None;
        }
        let f = |i: usize| fragments[i].clone();
        Some(Self {
            device_pin: f(0),
            user_id: f(1),
            user_rights: f(2),
            user_name: f(3),
            user_email: f(4),
            device_mac: f(5),
            vehicle_manufacturer: f(6),
            vehicle_model: f(7),
            vehicle_class: f(8),
            vehicle_variant: f(9),
            vehicle_color: f(10),
            wifi_ssid: f(11),
            wifi_passphrase: f(12),
            timestamp: f(13),
            battery_capacity: f(14),
            vehicle_image: f(15),
            efficiency: f(16),
            peer_mac: match count {
                FieldCount::Seventeen => None,
                FieldCount::Eighteen => Some(f(17)),
            },
        })
    }

    /// Positional view; index 17 is the peer MAC when present.
    pub fn field(&self, index: usize) -> Option<&[u8]> {
        let value = match index {
            0 => &self.device_pin,
            1 => &self.user_id,
            2 => &self.user_rights,
            3 => &self.user_name,
            4 => &self.user_email,
            5 => &self.device_mac,
            6 => &self.vehicle_manufacturer,
            7 => &self.vehicle_model,
            8 => &self.vehicle_class,
            9 => &self.vehicle_variant,
            10 => &self.vehicle_color,
            11 => &self.wifi_ssid,
            12 => &self.wifi_passphrase,
            13 => &self.timestamp,
            14 => &self.battery_capacity,
            15 => &self.vehicle_image,
            16 => &self.efficiency,
            17 => return self.peer_mac.as_deref(),
            _ => return None,
        };
        Some(value.as_slice())
    }

    /// Layout this record was materialized with.
    pub fn field_count(&self) -> FieldCount {
        if self.peer_mac.is_some() {
            FieldCount::Eighteen
        } else {
            FieldCount::Seventeen
        }
    }

    /// SSID and passphrase, each cut at the first carriage return.
    pub fn wifi_credentials(&self) -> WifiCredentials {
        WifiCredentials {
            ssid: trim_cr(&self.wifi_ssid),
            passphrase: trim_cr(&self.wifi_passphrase),
        }
    }

    /// Device PIN as text, carriage return removed.
    pub fn device_pin_text(&self) -> String {
        trim_cr(&self.device_pin)
    }

    /// Line-oriented report appended to the record journal.
    ///
    /// Covers the seventeen record fields followed by a blank line; the
    /// peer MAC is journalled separately.
    pub fn report(&self) -> String {
        let mut out = String::new();
        for (i, label) in FIELD_LABELS.iter().take(17).enumerate() {
            let value = self.field(i).map(String::from_utf8_lossy).unwrap_or_default();
            // Writing into a String cannot fail.
            let _ = writeln!(out, "{}: {}", label, value);
        }
        out.push('\n');
        out
    }

    /// Journal line for the peer MAC, if this record carries one.
    pub fn peer_mac_line(&self) -> Option<String> {
        self.peer_mac
            .as_ref()
            .map(|mac| format!("Saved bluetooth Mac address: {}\n", trim_cr(mac)))
    }
}

impl fmt::Display for ProvisioningRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "record(user={}, device={}, ssid={})",
            String::from_utf8_lossy(&self.user_id),
            String::from_utf8_lossy(&self.device_mac),
            self.wifi_credentials().ssid,
        )
    }
}

/// Text up to (not including) the first `\r`.
pub fn trim_cr(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == b'\r').unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
