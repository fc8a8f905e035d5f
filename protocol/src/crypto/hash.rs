//! # Hashing Utilities
//!
//! SHA-256 is the only hash in TapTicket. It names tickets
//! (`ticket_id = hex(SHA-256(nonce))`), turns device signatures into ticket
//! secrets, and turns `(time, place)` into challenges. Everything here is a
//! thin wrapper over `sha2` so the call sites read like the protocol
//! description.

use num_bigint::BigUint;
use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input data as a `Vec<u8>`.
///
/// # Example
///
/// ```
/// use tapticket_protocol::crypto::sha256;
///
/// let hash = sha256(b"tapticket");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Compute the SHA-256 hash and return a fixed-size array.
pub fn sha256_array(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Lower-case hex SHA-256 digest. This is the ticket ID format.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256_array(data))
}

/// Hash `data` and read the digest as an unsigned big-endian integer.
///
/// The result is *not* reduced: it is a 256-bit value. Callers that need
/// it inside a scalar range reduce it themselves.
pub fn hash_to_uint(data: &[u8]) -> BigUint {
    BigUint::from_bytes_be(&sha256_array(data))
}
