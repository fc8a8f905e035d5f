//! Error types for the contactless wire codec.
//!
//! Every decode path returns one of these instead of indexing past the end
//! of a buffer. The responder never shows them to the reader; they all
//! collapse to the `6F 00` trailer.

use thiserror::Error;

/// Framing errors raised while encoding or decoding APDUs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    /// The buffer ended before a declared field did.
    #[error("truncated frame: needed {needed} bytes, got {got}")]
    Truncated {
        /// Bytes required to read the next field.
        needed: usize,
        /// Bytes actually available.
        got: usize,
    },

    /// The instruction byte is not one this application understands.
    #[error("unknown instruction 0x{0:02X}")]
    UnknownInstruction(u8),

    /// A field is longer than its length prefix can describe.
    #[error("field {field} too long: {len} bytes (max {max})")]
    FieldTooLong {
        /// Which field overflowed.
        field: &'static str,
        /// Its length in bytes.
        len: usize,
        /// The prefix limit.
        max: usize,
    },

    /// The ticket identifier is not UTF-8.
    #[error("ticket id is not valid UTF-8")]
    InvalidUtf8,

    /// The response carried a non-success status trailer.
    #[error("status word {0:02X}{1:02X}")]
    Status(u8, u8),
}
