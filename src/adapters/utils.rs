//! Shared helpers for adapter-layer validation and formatting.

/// Returns `true` if every byte of `s` is in the printable ASCII range
/// `0x20..=0x7E`.
///
/// Used to validate SSIDs.
pub(super) fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

/// `AA:BB:CC:DD:EE:FF` rendering of a 6-byte address.
pub fn format_mac(mac: &[u8; 6]) -> String {
    let parts: Vec<String> = mac.iter().map(|b| format!("{:02X}", b)).collect();
    parts.join(":")
}
