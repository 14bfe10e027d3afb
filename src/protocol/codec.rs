//! Fixed-layout provisioning frame codec.
//!
//! Wire format (big-endian checksum, 12 bytes of fixed overhead):
//! ```text
//! ┌────┬──────────┬──────────┬──────┬─────┬───────────────┬──────────┬────┐
//! │ $  │ sent d/m/y│ event d/m/y│ kind │ len │ payload (len) │ sum (BE) │ #  │
//! │ 1B │    3B    │    3B    │  1B  │ 1B  │   0..=255 B   │    2B    │ 1B │
//! └────┴──────────┴──────────┴──────┴─────┴───────────────┴──────────┴────┘
//! ```
//!
//! The checksum is the lower 16 bits of the plain arithmetic sum of the
//! payload bytes. No CRC, no carry folding.
//!
//! Every frame arrives as exactly one characteristic write, so unlike a
//! stream codec there is no partial-read state here: `validate` and
//! `extract` operate on one complete buffer and are pure functions.

use core::fmt;

use chrono::{Datelike, NaiveDate};
use heapless::Vec;

/// Leading sentinel byte (`$`).
pub const MARKER_START: u8 = 0x24;

/// Trailing sentinel byte (`#`).
pub const MARKER_END: u8 = 0x23;

/// Marker + two date triples + kind + length.
pub const HEADER_LEN: usize = 9;

/// Checksum (2B) + end marker.
pub const FOOTER_LEN: usize = 3;

/// Largest payload the 1-byte length field can declare.
pub const MAX_PAYLOAD: usize = 255;

/// Largest complete frame on the wire.
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_PAYLOAD + FOOTER_LEN;

const KIND_OFFSET: usize = 7;
const LENGTH_OFFSET: usize = 8;

/// One decoded payload, owned (no aliasing of the inbound buffer).
pub type Payload = Vec<u8, MAX_PAYLOAD>;

/// A complete encoded frame.
pub type FrameBuf = Vec<u8, MAX_FRAME_LEN>;

// ── Packet kind ──────────────────────────────────────────────

/// Packet type discriminant carried in byte 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Initialization,
    Data,
    Ack,
    Nack,
    Unknown(u8),
}

impl PacketKind {
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::Initialization => 0x01,
            Self::Data => 0x02,
            Self::Ack => 0x03,
            Self::Nack => 0x04,
            Self::Unknown(raw) => raw,
        }
    }
}

impl From<u8> for PacketKind {
    fn from(raw: u8) -> Self {
        match raw {
            0x01 => Self::Initialization,
            0x02 => Self::Data,
            0x03 => Self::Ack,
            0x04 => Self::Nack,
            other => Self::Unknown(other),
        }
    }
}

impl From<PacketKind> for u8 {
    fn from(kind: PacketKind) -> Self {
        kind.to_u8()
    }
}

// ── Timestamp ────────────────────────────────────────────────

/// Day / month / year-mod-100 triple as carried in the header.
///
/// Values are opaque on decode: nothing checks that they form a real date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameDate {
    pub day: u8,
    pub month: u8,
    pub year: u8,
}

impl FrameDate {
    pub const fn new(day: u8, month: u8, year: u8) -> Self {
        Self { day, month, year }
    }

    /// Today's date from the local wall clock.
    pub fn today() -> Self {
        Self::from(chrono::Local::now().date_naive())
    }

    /// Calendar interpretation, assuming the 2000s. `None` for impossible dates.
    pub fn to_naive_date(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(
            2000 + i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )
    }

    const fn to_bytes(self) -> [u8; 3] {
        [self.day, self.month, self.year]
    }

    const fn from_bytes(b: [u8; 3]) -> Self {
        Self::new(b[0], b[1], b[2])
    }
}

impl From<NaiveDate> for FrameDate {
    fn from(date: NaiveDate) -> Self {
        Self {
            day: date.day() as u8,
            month: date.month() as u8,
            year: date.year().rem_euclid(100) as u8,
        }
    }
}

impl fmt::Display for FrameDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:02}/{:02}", self.day, self.month, self.year)
    }
}

// ── Errors ───────────────────────────────────────────────────

/// Structural reasons a frame is rejected. Recoverable by drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Fewer than 12 bytes.
    TooShort,
    /// First byte is not `0x24`.
    BadHeader,
    /// Buffer length disagrees with the declared payload length.
    LengthMismatch,
    /// Last byte is not `0x23`.
    BadFooter,
    /// Recomputed payload sum differs from the transmitted one.
    ChecksumMismatch,
}

impl FrameError {
    /// Stable one-byte code used in `Nack` payloads.
    pub const fn code(self) -> u8 {
        match self {
            Self::TooShort => 1,
            Self::BadHeader => 2,
            Self::LengthMismatch => 3,
            Self::BadFooter => 4,
            Self::ChecksumMismatch => 5,
        }
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort => write!(f, "frame too short"),
            Self::BadHeader => write!(f, "invalid start marker"),
            Self::LengthMismatch => write!(f, "declared length does not match frame size"),
            Self::BadFooter => write!(f, "invalid end marker"),
            Self::ChecksumMismatch => write!(f, "checksum mismatch"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// Payload longer than the 1-byte length field allows.
    PayloadTooLong(usize),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PayloadTooLong(n) => {
                write!(f, "payload of {} bytes exceeds {}", n, MAX_PAYLOAD)
            }
        }
    }
}

// ── Decoded frame ────────────────────────────────────────────

/// Everything `extract` copies out of a valid frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub sent: FrameDate,
    pub event: FrameDate,
    pub kind: PacketKind,
    pub length: u8,
    pub payload: Payload,
    pub checksum: u16,
}

// ── Operations ───────────────────────────────────────────────

/// Lower 16 bits of the arithmetic sum of `payload`.
pub fn checksum(payload: &[u8]) -> u16 {
    payload
        .iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(u16::from(b)))
}

/// Encode a frame stamped with today's date in both timestamp slots.
pub fn encode(kind: PacketKind, payload: &[u8]) -> Result<FrameBuf, EncodeError> {
    encode_dated(FrameDate::today(), kind, payload)
}

/// Encode a frame with an explicit header date.
pub fn encode_dated(
    date: FrameDate,
    kind: PacketKind,
    payload: &[u8],
) -> Result<FrameBuf, EncodeError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(EncodeError::PayloadTooLong(payload.len()));
    }

    let mut out = FrameBuf::new();
    let date = date.to_bytes();
    let sum = checksum(payload).to_be_bytes();

    // Capacity is MAX_FRAME_LEN and the payload is bounded above, so none
    // of these pushes can overflow.
    let _ = out.push(MARKER_START);
    let _ = out.extend_from_slice(&date);
    let _ = out.extend_from_slice(&date);
    let _ = out.push(kind.to_u8());
    let _ = out.push(payload.len() as u8);
    let _ = out.extend_from_slice(payload);
    let _ = out.extend_from_slice(&sum);
    let _ = out.push(MARKER_END);

    Ok(out)
}

/// Structural and checksum validation of one complete frame.
///
/// Checks run in wire order so the first defect found is the one reported.
pub fn validate(bytes: &[u8]) -> Result<(), FrameError> {
    if bytes.len() < HEADER_LEN + FOOTER_LEN {
        return Err(FrameError::TooShort);
    }
    if bytes[0] != MARKER_START {
        return Err(FrameError::BadHeader);
    }

    let declared = bytes[LENGTH_OFFSET] as usize;
    if bytes.len() != HEADER_LEN + declared + FOOTER_LEN {
        return Err(FrameError::LengthMismatch);
    }
    if bytes[bytes.len() - 1] != MARKER_END {
        return Err(FrameError::BadFooter);
    }

    let payload = &bytes[HEADER_LEN..HEADER_LEN + declared];
    if checksum(payload) != transmitted_checksum(bytes) {
        return Err(FrameError::ChecksumMismatch);
    }

    Ok(())
}

/// Validate, then copy every field out of the frame.
pub fn extract(bytes: &[u8]) -> Result<DecodedFrame, FrameError> {
    validate(bytes)?;

    let length = bytes[LENGTH_OFFSET];
    let mut payload = Payload::new();
    // `validate` bounded the slice to `length` (<= 255) bytes.
    let _ = payload.extend_from_slice(&bytes[HEADER_LEN..HEADER_LEN + length as usize]);

    Ok(DecodedFrame {
        sent: FrameDate::from_bytes([bytes[1], bytes[2], bytes[3]]),
        event: FrameDate::from_bytes([bytes[4], bytes[5], bytes[6]]),
        kind: PacketKind::from(bytes[KIND_OFFSET]),
        length,
        payload,
        checksum: transmitted_checksum(bytes),
    })
}

fn transmitted_checksum(bytes: &[u8]) -> u16 {
    let n = bytes.len();
    u16::from_be_bytes([bytes[n - 3], bytes[n - 2]])
}

// ── Tests ────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const DATE: FrameDate = FrameDate::new(16, 10, 26);

    #[test]
    fn encodes_exact_layout() {
        let frame = encode_dated(DATE, PacketKind::Initialization, &[0x01, 0x02, 0xFF]).unwrap();
        assert_eq!(
            frame.as_slice(),
            &[
                0x24, 16, 10, 26, 16, 10, 26, 0x01, 3, 0x01, 0x02, 0xFF, 0x01, 0x02, 0x23
            ]
        );
    }

    #[test]
    fn initialization_example_frame() {
        // LEV protocol version, reserved, charger state, 16-char charge point id.
        let data = [
            0x01, 0x00, 0x01, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x30, 0x41,
            0x42, 0x43, 0x44, 0x45, 0x46,
        ];
        let frame = encode_dated(DATE, PacketKind::Initialization, &data).unwrap();
        assert_eq!(frame.len(), 12 + data.len());
        let decoded = extract(&frame).unwrap();
        assert_eq!(decoded.kind, PacketKind::Initialization);
        assert_eq!(decoded.checksum, checksum(&data));
        assert_eq!(decoded.checksum, 0x03A4);
    }

    #[test]
    fn empty_payload_is_minimum_frame() {
        let frame = encode_dated(DATE, PacketKind::Ack, &[]).unwrap();
        assert_eq!(frame.len(), HEADER_LEN + FOOTER_LEN);
        assert!(validate(&frame).is_ok());
        assert_eq!(extract(&frame).unwrap().length, 0);
    }

    #[test]
    fn rejects_oversized_payload() {
        assert_eq!(
            encode_dated(DATE, PacketKind::Data, &[0u8; 256]),
            Err(EncodeError::PayloadTooLong(256))
        );
        assert!(encode_dated(DATE, PacketKind::Data, &[0u8; 255]).is_ok());
    }

    #[test]
    fn checksum_wraps_at_16_bits() {
        let payload = [0xFFu8; 255];
        assert_eq!(checksum(&payload), (255u32 * 255 % 65536) as u16);
    }

    #[test]
    fn each_defect_has_its_own_variant() {
        let good = encode_dated(DATE, PacketKind::Data, b"abc").unwrap();

        assert_eq!(validate(&good[..11]), Err(FrameError::TooShort));

        let mut bad_header = good.clone();
        bad_header[0] = 0x25;
        assert_eq!(validate(&bad_header), Err(FrameError::BadHeader));

        let mut bad_len = good.clone();
        bad_len[LENGTH_OFFSET] = 4;
        assert_eq!(validate(&bad_len), Err(FrameError::LengthMismatch));

        let mut bad_footer = good.clone();
        let last = bad_footer.len() - 1;
        bad_footer[last] = 0x00;
        assert_eq!(validate(&bad_footer), Err(FrameError::BadFooter));

        let mut bad_sum = good.clone();
        bad_sum[HEADER_LEN] ^= 0x01;
        assert_eq!(validate(&bad_sum), Err(FrameError::ChecksumMismatch));
    }

    #[test]
    fn extract_fails_closed() {
        assert_eq!(extract(&[0x24; 5]), Err(FrameError::TooShort));
    }

    #[test]
    fn extract_copies_both_dates() {
        let mut frame = encode_dated(DATE, PacketKind::Data, b"x").unwrap();
        frame[4] = 1;
        let decoded = extract(&frame).unwrap();
        assert_eq!(decoded.sent, DATE);
        assert_eq!(decoded.event, FrameDate::new(1, 10, 26));
    }

    #[test]
    fn unknown_kind_survives_decode() {
        let frame = encode_dated(DATE, PacketKind::Unknown(0x7A), b"z").unwrap();
        assert_eq!(extract(&frame).unwrap().kind, PacketKind::Unknown(0x7A));
        assert_eq!(PacketKind::from(0x02), PacketKind::Data);
    }

    #[test]
    fn frame_date_calendar_view() {
        assert_eq!(
            DATE.to_naive_date(),
            NaiveDate::from_ymd_opt(2026, 10, 16)
        );
        assert_eq!(FrameDate::new(31, 2, 26).to_naive_date(), None);
        let today = FrameDate::today();
        assert!((1..=12).contains(&today.month));
    }

    #[test]
    fn error_codes_are_distinct() {
        let codes = [
            FrameError::TooShort,
            FrameError::BadHeader,
            FrameError::LengthMismatch,
            FrameError::BadFooter,
            FrameError::ChecksumMismatch,
        ]
        .map(FrameError::code);
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
