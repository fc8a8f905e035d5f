//! # Cryptographic Primitives for TapTicket
//!
//! Everything a tap needs to prove or check possession of a ticket secret:
//!
//! - **group**: the finite-field group (RFC 3526 group 14, `g = 2`).
//! - **hash**: SHA-256 helpers; ticket IDs and challenges are SHA-256.
//! - **derivation**: device signing capability to per-ticket secret.
//! - **schnorr**: the challenge-response signature itself.
//!
//! Big-integer arithmetic is `num-bigint`. Nothing in this module touches
//! storage or the wire.

pub mod derivation;
pub mod group;
pub mod hash;
pub mod schnorr;

pub use derivation::{
    compute_public_key, derive_secret, DerivationError, SigningCapability,
    SoftwareSigningCapability,
};
pub use group::{GroupError, GroupParameters};
pub use hash::{hash_to_uint, sha256, sha256_array, sha256_hex};
pub use schnorr::{
    compute_challenge, reduce_challenge, sign, sign_with_nonce, verify, verify_signature,
    Signature,
};
