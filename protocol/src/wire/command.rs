//! # Command APDUs
//!
//! The reader sends exactly three commands:
//!
//! ```text
//! SELECT           00 A4 04 00 | Lc | AID (7 bytes)            | 00
//! GET_TICKET_META  00 A1 00 00 | 00
//! CHALLENGE        00 A2 00 00 | 20 | challenge (32 bytes, BE) | 00
//! ```
//!
//! Decoding is lenient about trailing bytes (a missing or extra `Le` is
//! fine) and strict about everything the holder actually reads.

use num_bigint::BigUint;

use super::error::WireError;
use super::require;
use crate::config::{
    APPLICATION_ID, CHALLENGE_LENGTH, CLA_PROPRIETARY, DATA_OFFSET, HEADER_LENGTH,
    INS_CHALLENGE, INS_GET_TICKET_META, INS_OFFSET, SELECT_HEADER,
};

/// A decoded command APDU.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// SELECT by AID. The AID may belong to another application.
    Select {
        /// Application identifier carried by the command.
        aid: Vec<u8>,
    },
    /// Ask for the active ticket's ID and public key.
    GetTicketMeta,
    /// Ask for a signature over a 32-byte big-endian challenge.
    Challenge([u8; CHALLENGE_LENGTH]),
}

impl Command {
    /// SELECT for this application's AID.
    pub fn select() -> Self {
        Command::Select {
            aid: APPLICATION_ID.to_vec(),
        }
    }

    /// CHALLENGE carrying `challenge`, zero-padded to 32 bytes.
    ///
    /// # Errors
    ///
    /// [`WireError::FieldTooLong`] if the value needs more than 32 bytes.
    pub fn challenge(challenge: &BigUint) -> Result<Self, WireError> {
        Ok(Command::Challenge(encode_challenge(challenge)?))
    }

    /// True for a SELECT naming our AID.
    pub fn selects_us(&self) -> bool {
        matches!(self, Command::Select { aid } if aid[..] == APPLICATION_ID[..])
    }

    /// Short name for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Select { .. } => "SELECT",
            Command::GetTicketMeta => "GET_TICKET_META",
            Command::Challenge(_) => "CHALLENGE",
        }
    }

    /// Serialize to APDU bytes.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Command::Select { aid } => {
                let mut out = Vec::with_capacity(DATA_OFFSET + aid.len() + 1);
                out.extend_from_slice(&SELECT_HEADER);
                // AIDs are at most 16 bytes by ISO 7816-4.
                out.push(aid.len() as u8);
                out.extend_from_slice(aid);
                out.push(0x00);
                out
            }
            Command::GetTicketMeta => {
                vec![CLA_PROPRIETARY, INS_GET_TICKET_META, 0x00, 0x00, 0x00]
            }
            Command::Challenge(challenge) => {
                let mut out = Vec::with_capacity(DATA_OFFSET + CHALLENGE_LENGTH + 1);
                out.extend_from_slice(&[CLA_PROPRIETARY, INS_CHALLENGE, 0x00, 0x00]);
                out.push(CHALLENGE_LENGTH as u8);
                out.extend_from_slice(challenge);
                out.push(0x00);
                out
            }
        }
    }

    /// Parse APDU bytes.
    ///
    /// # Errors
    ///
    /// [`WireError::Truncated`] for short frames and
    /// [`WireError::UnknownInstruction`] for anything else we do not speak.
    pub fn decode(apdu: &[u8]) -> Result<Self, WireError> {
        require(apdu, HEADER_LENGTH)?;

        if apdu[..HEADER_LENGTH] == SELECT_HEADER {
            require(apdu, DATA_OFFSET)?;
            let aid_len = apdu[HEADER_LENGTH] as usize;
            require(apdu, DATA_OFFSET + aid_len)?;
            return Ok(Command::Select {
                aid: apdu[DATA_OFFSET..DATA_OFFSET + aid_len].to_vec(),
            });
        }

        match apdu[INS_OFFSET] {
            INS_GET_TICKET_META => Ok(Command::GetTicketMeta),
            INS_CHALLENGE => {
                require(apdu, DATA_OFFSET + CHALLENGE_LENGTH)?;
                let mut challenge = [0u8; CHALLENGE_LENGTH];
                challenge.copy_from_slice(&apdu[DATA_OFFSET..DATA_OFFSET + CHALLENGE_LENGTH]);
                Ok(Command::Challenge(challenge))
            }
            other => Err(WireError::UnknownInstruction(other)),
        }
    }
}

/// Left-pad the big-endian bytes of `challenge` to 32 bytes.
pub fn encode_challenge(challenge: &BigUint) -> Result<[u8; CHALLENGE_LENGTH], WireError> {
    let bytes = challenge.to_bytes_be();
    if bytes.len() > CHALLENGE_LENGTH {
        return Err(WireError::FieldTooLong {
            field: "challenge",
            len: bytes.len(),
            max: CHALLENGE_LENGTH,
        });
    }
    let mut out = [0u8; CHALLENGE_LENGTH];
    out[CHALLENGE_LENGTH - bytes.len()..].copy_from_slice(&bytes);
    Ok(out)
}

/// Read a 32-byte challenge payload as an unsigned integer.
pub fn decode_challenge(payload: &[u8; CHALLENGE_LENGTH]) -> BigUint {
    BigUint::from_bytes_be(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_matches_reference_bytes() {
        let bytes = Command::select().encode();
        assert_eq!(
            bytes,
            vec![0x00, 0xA4, 0x04, 0x00, 0x07, 0xF0, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x00]
        );
        let decoded = Command::decode(&bytes).unwrap();
        assert!(decoded.selects_us());
    }

    #[test]
    fn select_without_le_is_accepted() {
        let bytes = Command::select().encode();
        let decoded = Command::decode(&bytes[..bytes.len() - 1]).unwrap();
        assert!(decoded.selects_us());
    }

    #[test]
    fn foreign_aid_is_not_ours() {
        let bytes = [0x00, 0xA4, 0x04, 0x00, 0x02, 0xA0, 0x00];
        let decoded = Command::decode(&bytes).unwrap();
        assert_eq!(decoded, Command::Select { aid: vec![0xA0, 0x00] });
        assert!(!decoded.selects_us());
    }

    #[test]
    fn select_with_short_aid_is_truncated() {
        let bytes = [0x00, 0xA4, 0x04, 0x00, 0x07, 0xF0, 0x01];
        assert_eq!(
            Command::decode(&bytes),
            Err(WireError::Truncated { needed: 12, got: 7 })
        );
    }

    #[test]
    fn get_ticket_meta_roundtrip() {
        let bytes = Command::GetTicketMeta.encode();
        assert_eq!(bytes, vec![0x00, 0xA1, 0x00, 0x00, 0x00]);
        assert_eq!(Command::decode(&bytes).unwrap(), Command::GetTicketMeta);
    }

    #[test]
    fn challenge_is_left_padded() {
        let cmd = Command::challenge(&BigUint::from(0x0102u32)).unwrap();
        let bytes = cmd.encode();
        assert_eq!(bytes.len(), 5 + 32 + 1);
        assert_eq!(&bytes[..5], &[0x00, 0xA2, 0x00, 0x00, 0x20]);
        assert!(bytes[5..35].iter().all(|b| *b == 0));
        assert_eq!(&bytes[35..37], &[0x01, 0x02]);

        match Command::decode(&bytes).unwrap() {
            Command::Challenge(payload) => {
                assert_eq!(decode_challenge(&payload), BigUint::from(0x0102u32));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn oversized_challenge_is_rejected() {
        let too_big = BigUint::from(1u32) << 256;
        assert!(matches!(
            Command::challenge(&too_big),
            Err(WireError::FieldTooLong { .. })
        ));
    }

    #[test]
    fn short_challenge_is_truncated() {
        let bytes = [0x00, 0xA2, 0x00, 0x00, 0x20, 0x01, 0x02];
        assert!(matches!(
            Command::decode(&bytes),
            Err(WireError::Truncated { .. })
        ));
    }

    #[test]
    fn unknown_instruction_is_rejected() {
        assert_eq!(
            Command::decode(&[0x00, 0xB0, 0x00, 0x00]),
            Err(WireError::UnknownInstruction(0xB0))
        );
    }

    #[test]
    fn tiny_frames_are_truncated() {
        assert!(Command::decode(&[]).is_err());
        assert!(Command::decode(&[0x00]).is_err());
        assert!(Command::decode(&[0x00, 0xA1, 0x00]).is_err());
    }
}
