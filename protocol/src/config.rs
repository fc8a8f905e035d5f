//! # Protocol Configuration & Constants
//!
//! Every magic number in TapTicket lives here. The wire constants are shared
//! by the holder (card emulation) and the verifier (reader) side, so a
//! change on one side without the other breaks every tap in the field.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Protocol version string, reported by the CLI.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Application Identifier
// ---------------------------------------------------------------------------

/// The 7-byte proprietary AID the holder registers for card emulation.
/// The leading `F0` nibble marks it as a proprietary (unregistered) AID.
pub const APPLICATION_ID: [u8; 7] = [0xF0, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06];

// ---------------------------------------------------------------------------
// APDU Layout
// ---------------------------------------------------------------------------

/// SELECT by DF name: CLA, INS, P1, P2.
pub const SELECT_HEADER: [u8; 4] = [0x00, 0xA4, 0x04, 0x00];

/// Class byte used for the two data commands.
pub const CLA_PROPRIETARY: u8 = 0x00;

/// Instruction byte of the SELECT command.
pub const INS_SELECT: u8 = 0xA4;

/// Instruction byte of GET_TICKET_META.
pub const INS_GET_TICKET_META: u8 = 0xA1;

/// Instruction byte of CHALLENGE.
pub const INS_CHALLENGE: u8 = 0xA2;

/// Offset of the instruction byte inside a command APDU.
pub const INS_OFFSET: usize = 1;

/// Length of the fixed command header (CLA INS P1 P2).
pub const HEADER_LENGTH: usize = 4;

/// Offset of the command data field (after the header and Lc).
pub const DATA_OFFSET: usize = HEADER_LENGTH + 1;

// ---------------------------------------------------------------------------
// Status Words
// ---------------------------------------------------------------------------

/// `90 00` -- normal processing.
pub const SW_SUCCESS: [u8; 2] = [0x90, 0x00];

/// `6F 00` -- no precise diagnosis. Every failure maps here so a probing
/// reader learns nothing about why a command was refused.
pub const SW_FAILURE: [u8; 2] = [0x6F, 0x00];

/// Length of the status trailer appended to every response.
pub const STATUS_LENGTH: usize = 2;

// ---------------------------------------------------------------------------
// Field Sizes
// ---------------------------------------------------------------------------

/// Challenge payload length on the wire. Challenges are left zero-padded.
pub const CHALLENGE_LENGTH: usize = 32;

/// Ticket nonce length. The ticket ID is the SHA-256 of these bytes.
pub const NONCE_LENGTH: usize = 32;

/// SHA-256 output length.
pub const HASH_OUTPUT_LENGTH: usize = 32;

/// Longest ticket ID the 1-byte length prefix can describe.
pub const MAX_TICKET_ID_LENGTH: usize = u8::MAX as usize;

/// Longest integer the 2-byte length prefixes can describe.
pub const MAX_INTEGER_LENGTH: usize = u16::MAX as usize;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Bound on every blocking transport step (connect, transceive). A tap that
/// stalls longer than this is treated as a lost link.
pub const TRANSCEIVE_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Group Parameters
// ---------------------------------------------------------------------------

/// RFC 3526 2048-bit MODP group 14 prime. A safe prime: `(p - 1) / 2` is
/// prime too.
pub const GROUP_MODULUS_HEX: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1",
    "29024E088A67CC74020BBEA63B139B22514A08798E3404DD",
    "EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245",
    "E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED",
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3D",
    "C2007CB8A163BF0598DA48361C55D39A69163FA8FD24CF5F",
    "83655D23DCA3AD961C62F356208552BB9ED529077096966D",
    "670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B",
    "E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9",
    "DE2BCBF6955817183995497CEA956AE515D2261898FA0510",
    "15728E5A8AACAA68FFFFFFFFFFFFFFFF",
);

/// Group generator. 2 is a quadratic residue modulo the group 14 prime, so
/// it generates the prime-order subgroup of size `(p - 1) / 2`.
pub const GROUP_GENERATOR: u32 = 2;

/// Nominal 256-bit scalar order used to draw signing nonces and to reduce
/// incoming challenges.
pub const SCALAR_ORDER_HEX: &str =
    "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141";
