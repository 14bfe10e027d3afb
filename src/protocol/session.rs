//! Per-connection reassembly of payload fragments into a record.
//!
//! ```text
//!   Idle ──append──▶ Accumulating ──append (len == N)──▶ Complete
//!    ▲                    │                                  │
//!    └── clear / evict ◀──┘◀──────── try_materialize ────────┘
//! ```
//!
//! Only the connection loop owns a `Session`; nothing here is shared or
//! global, so a second connection simply gets a second instance.

use core::fmt;

use heapless::Vec;

use super::codec::Payload;
use super::record::{FieldCount, MAX_FIELDS, ProvisioningRecord};

/// Observable reassembly state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Buffer empty.
    Idle,
    /// Holding `n` fragments, `0 < n < N`.
    Accumulating(usize),
    /// Holding exactly `N` fragments; the next `try_materialize` succeeds.
    Complete,
}

/// Appending to a session that already holds `N` fragments.
///
/// Cannot happen when the caller materializes after every append, which
/// the provisioning service always does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionFull;

impl fmt::Display for SessionFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session already holds a complete record")
    }
}

pub struct Session {
    fields: FieldCount,
    buffer: Vec<Payload, MAX_FIELDS>,
    last_append_ms: Option<u64>,
}

impl Session {
    pub const fn new(fields: FieldCount) -> Self {
        Self {
            fields,
            buffer: Vec::new(),
            last_append_ms: None,
        }
    }

    pub fn field_count(&self) -> FieldCount {
        self.fields
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn state(&self) -> SessionState {
        match self.buffer.len() {
            0 => SessionState::Idle,
            n if n >= self.fields.get() => SessionState::Complete,
            n => SessionState::Accumulating(n),
        }
    }

    /// Append one payload. The packet kind is not consulted.
    pub fn append(&mut self, fragment: Payload, now_ms: u64) -> Result<SessionState, SessionFull> {
        if self.buffer.len() >= self.fields.get() {
            return Err(SessionFull);
        }
        self.buffer.push(fragment).map_err(|_| SessionFull)?;
        self.last_append_ms = Some(now_ms);
        Ok(self.state())
    }

    /// Take the record out once exactly `N` fragments are held.
    ///
    /// All-or-nothing: on `Some` the buffer is already empty, on `None`
    /// nothing changed.
    pub fn try_materialize(&mut self) -> Option<ProvisioningRecord> {
        let record = ProvisioningRecord::from_fragments(&self.buffer, self.fields)?;
        self.clear();
        Some(record)
    }

    /// Discard everything held (disconnect path).
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.last_append_ms = None;
    }

    /// Drop a stalled partial session. Returns `true` if something was dropped.
    ///
    /// `timeout_ms == 0` disables eviction.
    pub fn evict_if_idle(&mut self, now_ms: u64, timeout_ms: u64) -> bool {
        if timeout_ms == 0 || self.buffer.is_empty() {
            return false;
        }
        match self.last_append_ms {
            Some(last) if now_ms.saturating_sub(last) >= timeout_ms => {
                self.clear();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(b: u8) -> Payload {
        Payload::from_slice(&[b]).unwrap()
    }

    #[test]
    fn starts_idle() {
        let s = Session::new(FieldCount::Seventeen);
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.is_empty());
    }

    #[test]
    fn materializes_exactly_at_threshold() {
        let mut s = Session::new(FieldCount::Seventeen);
        for i in 1..=16u8 {
            assert_eq!(s.append(frag(i), 0), Ok(SessionState::Accumulating(i as usize)));
            assert!(s.try_materialize().is_none());
        }
        assert_eq!(s.append(frag(17), 0), Ok(SessionState::Complete));
        let rec = s.try_materialize().unwrap();
        assert_eq!(rec.device_pin.as_slice(), &[1]);
        assert_eq!(rec.efficiency.as_slice(), &[17]);
        assert!(s.is_empty());

        s.append(frag(18), 0).unwrap();
        assert!(s.try_materialize().is_none());
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn eighteen_field_sessions_wait_for_peer_mac() {
        let mut s = Session::new(FieldCount::Eighteen);
        for i in 0..17u8 {
            s.append(frag(i), 0).unwrap();
        }
        assert!(s.try_materialize().is_none());
        s.append(frag(17), 0).unwrap();
        let rec = s.try_materialize().unwrap();
        assert_eq!(rec.peer_mac.as_deref(), Some(&[17u8][..]));
    }

    #[test]
    fn refuses_append_past_threshold() {
        let mut s = Session::new(FieldCount::Seventeen);
        for i in 0..17u8 {
            s.append(frag(i), 0).unwrap();
        }
        assert_eq!(s.append(frag(99), 0), Err(SessionFull));
        assert_eq!(s.len(), 17);
    }

    #[test]
    fn evicts_only_after_timeout() {
        let mut s = Session::new(FieldCount::Seventeen);
        s.append(frag(1), 1_000).unwrap();
        assert!(!s.evict_if_idle(1_500, 1_000));
        assert!(!s.evict_if_idle(50_000, 0));
        assert!(s.evict_if_idle(2_000, 1_000));
        assert_eq!(s.state(), SessionState::Idle);
        assert!(!s.evict_if_idle(10_000, 1_000));
    }

    #[test]
    fn clear_resets_timer() {
        let mut s = Session::new(FieldCount::Seventeen);
        s.append(frag(1), 0).unwrap();
        s.clear();
        assert!(s.is_empty());
        s.append(frag(2), 5_000).unwrap();
        assert!(!s.evict_if_idle(5_500, 1_000));
    }
}
