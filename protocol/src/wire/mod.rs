//! # Contactless Wire Codec
//!
//! Byte-exact encoding of the three command/response pairs a tap consists of.
//! The codec sits between the session state machines and whatever transport
//! carries the bytes (ISO-DEP on a phone, an in-process loopback in tests).
//!
//! ```text
//!   ┌────────────┐                                ┌────────────┐
//!   │ Initiator  │                                │ Responder  │
//!   │ (verifier) │                                │  (holder)  │
//!   └─────┬──────┘                                └─────┬──────┘
//!         │  SELECT AID                                 │
//!         ├────────────────────────────────────────────►│
//!         │  90 00                                      │
//!         │◄────────────────────────────────────────────┤
//!         │  GET_TICKET_META                            │
//!         ├────────────────────────────────────────────►│
//!         │  ticket_id, P, 90 00                        │
//!         │◄────────────────────────────────────────────┤
//!         │  CHALLENGE c  (repeatable)                  │
//!         ├────────────────────────────────────────────►│
//!         │  S, R, 90 00                                │
//!         │◄────────────────────────────────────────────┤
//! ```
//!
//! All decoders fail closed: a short or malformed buffer is a
//! [`WireError`], never a panic and never a partially-filled value.

pub mod command;
pub mod response;

mod error;

pub use command::{decode_challenge, encode_challenge, Command};
pub use error::WireError;
pub use response::{
    decode_signature, encode_signature, failure, is_success, split_status, success, TicketMeta,
};

use num_bigint::BigUint;

/// Fail with [`WireError::Truncated`] unless `buf` holds at least `needed`
/// bytes.
pub(crate) fn require(buf: &[u8], needed: usize) -> Result<(), WireError> {
    if buf.len() < needed {
        return Err(WireError::Truncated {
            needed,
            got: buf.len(),
        });
    }
    Ok(())
}

/// Bounds-checked forward reader over a response body.
pub(crate) struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn take(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        let end = self.pos.checked_add(len).ok_or(WireError::Truncated {
            needed: usize::MAX,
            got: self.buf.len(),
        })?;
        require(self.buf, end)?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, WireError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// `len:2 BE | bytes` as an unsigned integer.
    pub(crate) fn integer(&mut self) -> Result<BigUint, WireError> {
        let len = self.u16()? as usize;
        Ok(BigUint::from_bytes_be(self.take(len)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_reads_in_order() {
        let data = [0x01, 0x00, 0x02, 0xAB, 0xCD];
        let mut cursor = Cursor::new(&data);
        assert_eq!(cursor.u8().unwrap(), 0x01);
        assert_eq!(cursor.integer().unwrap(), BigUint::from(0xABCDu32));
        assert!(cursor.u8().is_err());
    }

    #[test]
    fn cursor_does_not_advance_on_failure() {
        let data = [0xAA];
        let mut cursor = Cursor::new(&data);
        assert!(cursor.take(2).is_err());
        assert_eq!(cursor.u8().unwrap(), 0xAA);
    }
}
