//! # Response APDUs
//!
//! Every response ends in a 2-byte status word. Successful data responses
//! put length-prefixed fields in front of it:
//!
//! ```text
//! GET_TICKET_META   len(id):1 | id (UTF-8) | len(P):2 BE | P          | 90 00
//! CHALLENGE         len(S):2 BE | S        | len(R):2 BE | R          | 90 00
//! any failure                                                         6F 00
//! ```
//!
//! Integers travel as minimal unsigned big-endian byte strings.

use num_bigint::BigUint;

use super::error::WireError;
use super::Cursor;
use crate::config::{
    MAX_INTEGER_LENGTH, MAX_TICKET_ID_LENGTH, STATUS_LENGTH, SW_FAILURE, SW_SUCCESS,
};
use crate::crypto::Signature;

/// Payload of a successful GET_TICKET_META response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TicketMeta {
    /// Ticket identifier (hex digest).
    pub ticket_id: String,
    /// The responding device's own public key `P`.
    pub public_key: BigUint,
}

/// The bare `90 00` trailer.
pub fn success() -> Vec<u8> {
    SW_SUCCESS.to_vec()
}

/// The bare `6F 00` trailer.
pub fn failure() -> Vec<u8> {
    SW_FAILURE.to_vec()
}

/// Split a response into its data and check the status word.
///
/// # Errors
///
/// [`WireError::Truncated`] if there is no room for a trailer,
/// [`WireError::Status`] if the trailer is not `90 00`.
pub fn split_status(response: &[u8]) -> Result<&[u8], WireError> {
    if response.len() < STATUS_LENGTH {
        return Err(WireError::Truncated {
            needed: STATUS_LENGTH,
            got: response.len(),
        });
    }
    let (data, status) = response.split_at(response.len() - STATUS_LENGTH);
    if status != SW_SUCCESS.as_slice() {
        return Err(WireError::Status(status[0], status[1]));
    }
    Ok(data)
}

/// True if `response` ends in `90 00`.
pub fn is_success(response: &[u8]) -> bool {
    split_status(response).is_ok()
}

impl TicketMeta {
    /// Encode as a full success response.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let id = self.ticket_id.as_bytes();
        if id.len() > MAX_TICKET_ID_LENGTH {
            return Err(WireError::FieldTooLong {
                field: "ticket_id",
                len: id.len(),
                max: MAX_TICKET_ID_LENGTH,
            });
        }

        let key = self.public_key.to_bytes_be();
        let mut out = Vec::with_capacity(1 + id.len() + 2 + key.len() + STATUS_LENGTH);
        out.push(id.len() as u8);
        out.extend_from_slice(id);
        put_integer(&mut out, "public_key", &key)?;
        out.extend_from_slice(&SW_SUCCESS);
        Ok(out)
    }

    /// Decode a full response (data plus trailer).
    pub fn decode(response: &[u8]) -> Result<Self, WireError> {
        let mut cursor = Cursor::new(split_status(response)?);
        let id_len = cursor.u8()? as usize;
        let id = cursor.take(id_len)?;
        let ticket_id = std::str::from_utf8(id)
            .map_err(|_| WireError::InvalidUtf8)?
            .to_string();
        let public_key = cursor.integer()?;
        Ok(Self {
            ticket_id,
            public_key,
        })
    }
}

/// Encode a signature as a full CHALLENGE success response.
pub fn encode_signature(signature: &Signature) -> Result<Vec<u8>, WireError> {
    let s = signature.s.to_bytes_be();
    let r = signature.r.to_bytes_be();
    let mut out = Vec::with_capacity(4 + s.len() + r.len() + STATUS_LENGTH);
    put_integer(&mut out, "S", &s)?;
    put_integer(&mut out, "R", &r)?;
    out.extend_from_slice(&SW_SUCCESS);
    Ok(out)
}

/// Decode a full CHALLENGE response into `(S, R)`.
pub fn decode_signature(response: &[u8]) -> Result<Signature, WireError> {
    let mut cursor = Cursor::new(split_status(response)?);
    let s = cursor.integer()?;
    let r = cursor.integer()?;
    Ok(Signature { s, r })
}

fn put_integer(out: &mut Vec<u8>, field: &'static str, bytes: &[u8]) -> Result<(), WireError> {
    if bytes.len() > MAX_INTEGER_LENGTH {
        return Err(WireError::FieldTooLong {
            field,
            len: bytes.len(),
            max: MAX_INTEGER_LENGTH,
        });
    }
    out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_meta_layout() {
        let meta = TicketMeta {
            ticket_id: "ab".to_string(),
            public_key: BigUint::from(0x0102_03u32),
        };
        let bytes = meta.encode().unwrap();
        assert_eq!(
            bytes,
            vec![0x02, b'a', b'b', 0x00, 0x03, 0x01, 0x02, 0x03, 0x90, 0x00]
        );
        assert_eq!(TicketMeta::decode(&bytes).unwrap(), meta);
    }

    #[test]
    fn signature_layout() {
        let sig = Signature {
            s: BigUint::from(0xAAu32),
            r: BigUint::from(0x0BCCu32),
        };
        let bytes = encode_signature(&sig).unwrap();
        assert_eq!(
            bytes,
            vec![0x00, 0x01, 0xAA, 0x00, 0x02, 0x0B, 0xCC, 0x90, 0x00]
        );
        assert_eq!(decode_signature(&bytes).unwrap(), sig);
    }

    #[test]
    fn failure_trailer_is_reported() {
        assert_eq!(
            decode_signature(&failure()),
            Err(WireError::Status(0x6F, 0x00))
        );
        assert!(!is_success(&failure()));
        assert!(is_success(&success()));
    }

    #[test]
    fn declared_length_beyond_buffer_is_truncated() {
        // S claims 0x0100 bytes but only 1 follows.
        let bytes = [0x01, 0x00, 0xAA, 0x90, 0x00];
        assert!(matches!(
            decode_signature(&bytes),
            Err(WireError::Truncated { .. })
        ));
    }

    #[test]
    fn missing_r_is_truncated() {
        let bytes = [0x00, 0x01, 0xAA, 0x90, 0x00];
        assert!(matches!(
            decode_signature(&bytes),
            Err(WireError::Truncated { .. })
        ));
    }

    #[test]
    fn invalid_utf8_ticket_id() {
        let bytes = [0x01, 0xFF, 0x00, 0x01, 0x05, 0x90, 0x00];
        assert_eq!(TicketMeta::decode(&bytes), Err(WireError::InvalidUtf8));
    }

    #[test]
    fn oversized_ticket_id_is_rejected() {
        let meta = TicketMeta {
            ticket_id: "x".repeat(256),
            public_key: BigUint::from(1u32),
        };
        assert!(matches!(
            meta.encode(),
            Err(WireError::FieldTooLong { field: "ticket_id", .. })
        ));
    }

    #[test]
    fn empty_response_is_truncated() {
        assert!(matches!(
            split_status(&[0x90]),
            Err(WireError::Truncated { .. })
        ));
    }
}
