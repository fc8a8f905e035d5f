//! # Ticket Secret Derivation
//!
//! A ticket's secret scalar is never stored as the source of truth. It is
//! recomputed from the device's signing capability:
//!
//! ```text
//! acc = SHA-256( Sign(device_key, ticket_id) )      as unsigned integer
//! P   = g^acc mod p
//! ```
//!
//! The construction relies on the signature being deterministic. The same
//! device key signing the same ticket ID must always produce the same bytes,
//! otherwise a device could not re-derive its own secret and two derivations
//! would yield two unrelated public keys. Ed25519 (RFC 8032) gives that for
//! free, which is why the software capability below is Ed25519-backed.
//!
//! Different devices signing the same ticket ID get different `acc_i`, which
//! is what lets several devices hold one ticket without sharing a secret.

use std::fs;
use std::path::Path;

use ed25519_dalek::{Signer, SigningKey};
use num_bigint::BigUint;
use rand::rngs::OsRng;
use thiserror::Error;
use tracing::{debug, info};

use super::group::GroupParameters;
use super::hash::hash_to_uint;

/// Errors raised while deriving a ticket secret.
#[derive(Debug, Error)]
pub enum DerivationError {
    /// The device signing capability could not be created or accessed.
    /// Fatal for whatever operation asked for a derivation.
    #[error("device signing key unavailable: {0}")]
    KeyUnavailable(String),
}

/// A device-bound signing capability.
///
/// Platform implementations wrap a hardware key store; the software one is
/// used by the CLI and by tests. Implementations must be deterministic:
/// signing the same message twice returns the same bytes.
pub trait SigningCapability: Send + Sync {
    /// Sign `message` with the device key.
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, DerivationError>;
}

/// Ed25519 device key held in process memory.
///
/// Deliberately not `Serialize` and not `Debug`-printable: the only way to
/// get key material out is [`SoftwareSigningCapability::seed_hex`].
pub struct SoftwareSigningCapability {
    signing_key: SigningKey,
}

impl SoftwareSigningCapability {
    /// Fresh device key from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Device key from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Device key from a hex-encoded 32-byte seed.
    pub fn from_hex(seed_hex: &str) -> Result<Self, DerivationError> {
        let bytes = hex::decode(seed_hex.trim())
            .map_err(|_| DerivationError::KeyUnavailable("seed is not valid hex".to_string()))?;
        let seed: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            DerivationError::KeyUnavailable(format!("seed must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self::from_seed(&seed))
    }

    /// Load the device key stored at `path`, creating and persisting a new
    /// one if the file does not exist yet. This is how the key survives
    /// restarts outside a hardware key store.
    pub fn load_or_create(path: &Path) -> Result<Self, DerivationError> {
        if path.exists() {
            let contents = fs::read_to_string(path).map_err(|e| {
                DerivationError::KeyUnavailable(format!("read {}: {e}", path.display()))
            })?;
            debug!(path = %path.display(), "loaded existing device key");
            return Self::from_hex(&contents);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                DerivationError::KeyUnavailable(format!("create {}: {e}", parent.display()))
            })?;
        }
        let capability = Self::generate();
        fs::write(path, capability.seed_hex()).map_err(|e| {
            DerivationError::KeyUnavailable(format!("write {}: {e}", path.display()))
        })?;
        info!(path = %path.display(), "created new device key");
        Ok(capability)
    }

    /// Hex of the 32-byte seed. Handle with care.
    pub fn seed_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }
}

impl SigningCapability for SoftwareSigningCapability {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, DerivationError> {
        Ok(self.signing_key.sign(message).to_bytes().to_vec())
    }
}

/// Derive this device's secret scalar for `ticket_id`.
///
/// # Errors
///
/// [`DerivationError::KeyUnavailable`] if the capability cannot sign.
pub fn derive_secret(
    capability: &dyn SigningCapability,
    ticket_id: &str,
) -> Result<BigUint, DerivationError> {
    let signature = capability.sign(ticket_id.as_bytes())?;
    let acc = hash_to_uint(&signature);
    debug!(ticket_id, acc = %short_hex(&acc), "derived ticket secret");
    Ok(acc)
}

/// `P = g^acc mod p`.
pub fn compute_public_key(params: &GroupParameters, acc: &BigUint) -> BigUint {
    params.exp(acc)
}

/// First 16 hex digits of a big integer, for log lines.
pub(crate) fn short_hex(value: &BigUint) -> String {
    let mut s = value.to_str_radix(16);
    s.truncate(16);
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenKeyStore;

    impl SigningCapability for BrokenKeyStore {
        fn sign(&self, _message: &[u8]) -> Result<Vec<u8>, DerivationError> {
            Err(DerivationError::KeyUnavailable("keystore locked".to_string()))
        }
    }

    #[test]
    fn derivation_is_deterministic() {
        let device = SoftwareSigningCapability::from_seed(&[7u8; 32]);
        let a = derive_secret(&device, "ticket-1").unwrap();
        let b = derive_secret(&device, "ticket-1").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_devices_get_distinct_secrets() {
        let phone = SoftwareSigningCapability::from_seed(&[1u8; 32]);
        let watch = SoftwareSigningCapability::from_seed(&[2u8; 32]);
        let a = derive_secret(&phone, "shared").unwrap();
        let b = derive_secret(&watch, "shared").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn distinct_tickets_get_distinct_secrets() {
        let device = SoftwareSigningCapability::generate();
        let a = derive_secret(&device, "ticket-a").unwrap();
        let b = derive_secret(&device, "ticket-b").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn secret_fits_in_256_bits() {
        let device = SoftwareSigningCapability::generate();
        let acc = derive_secret(&device, "any").unwrap();
        assert!(acc.bits() <= 256);
    }

    #[test]
    fn unavailable_key_is_reported() {
        let result = derive_secret(&BrokenKeyStore, "ticket");
        assert!(matches!(result, Err(DerivationError::KeyUnavailable(_))));
    }

    #[test]
    fn public_key_matches_group_exponentiation() {
        let params = GroupParameters::new(23u32.into(), 4u32.into(), 11u32.into()).unwrap();
        let p = compute_public_key(&params, &BigUint::from(7u32));
        assert_eq!(p, BigUint::from(8u32));
    }

    #[test]
    fn hex_seed_roundtrip() {
        let device = SoftwareSigningCapability::generate();
        let restored = SoftwareSigningCapability::from_hex(&device.seed_hex()).unwrap();
        assert_eq!(
            derive_secret(&device, "t").unwrap(),
            derive_secret(&restored, "t").unwrap()
        );
    }

    #[test]
    fn bad_hex_seed_is_rejected() {
        assert!(SoftwareSigningCapability::from_hex("zz").is_err());
        assert!(SoftwareSigningCapability::from_hex("abcd").is_err());
    }

    #[test]
    fn load_or_create_persists_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys").join("device.key");

        let first = SoftwareSigningCapability::load_or_create(&path).unwrap();
        assert!(path.exists());
        let second = SoftwareSigningCapability::load_or_create(&path).unwrap();

        assert_eq!(first.seed_hex(), second.seed_hex());
    }
}
