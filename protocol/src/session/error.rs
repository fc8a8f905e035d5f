//! Error types for tap sessions.

use thiserror::Error;

use crate::storage::StorageError;
use crate::wire::WireError;

/// Errors raised while driving or answering a tap.
///
/// A signature that fails to verify is not an error: the verifier gets a
/// [`VerificationResult`](crate::ticket::VerificationResult) with
/// `is_valid == false`.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The discovered tag does not offer the ISO-DEP style transport.
    #[error("tag does not support the contactless transport")]
    TransportUnavailable,

    /// The link failed while connecting or exchanging frames.
    #[error("transport error: {0}")]
    Transport(String),

    /// No response within the transceive timeout.
    #[error("transceive timed out")]
    Timeout,

    /// The peer answered, but not the way the protocol expects.
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// Reader mode is off; the tag was not processed.
    #[error("reader mode is disabled")]
    ReaderDisabled,

    /// A frame could not be encoded or decoded.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// The holder's repository failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
