//! # Ticket & Verification Records
//!
//! A [`Ticket`] is one device's view of a credential: the public identifier
//! everyone can see, the secret scalar only this device can re-derive, and
//! the list of public keys every device holding the same ticket has
//! registered.

use std::fmt;

use chrono::Utc;
use num_bigint::BigUint;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::NONCE_LENGTH;
use crate::crypto::{
    compute_public_key, derive_secret, sha256_hex, DerivationError, GroupParameters,
    SigningCapability,
};

/// A ticket credential as held by this device.
#[derive(Clone, PartialEq, Eq)]
pub struct Ticket {
    /// Lower-case hex SHA-256 of the creating device's nonce.
    pub ticket_id: String,
    /// Random seed. For generated tickets, `ticket_id == hex(SHA-256(nonce))`.
    pub nonce: [u8; NONCE_LENGTH],
    /// This device's secret scalar for the ticket.
    pub acc: BigUint,
    /// This device's public key `P = g^acc mod p`.
    pub public_key: BigUint,
    /// Every public key registered against this ticket, in registration
    /// order, without duplicates.
    pub public_keys: Vec<BigUint>,
    /// Creation time, Unix milliseconds.
    pub timestamp: i64,
    /// Holder has added the ticket to their wallet.
    pub added_to_wallet: bool,
    /// This is the ticket presented on the next tap. At most one per device.
    pub nfc_enabled: bool,
}

impl Ticket {
    /// Create a brand-new ticket: fresh nonce, ID = hash of the nonce, and
    /// this device's secret derived for that ID.
    ///
    /// # Errors
    ///
    /// [`DerivationError::KeyUnavailable`] if the device key cannot sign.
    /// Nothing is returned half-built in that case.
    pub fn generate(
        capability: &dyn SigningCapability,
        params: &GroupParameters,
    ) -> Result<Self, DerivationError> {
        let mut nonce = [0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce);
        let ticket_id = sha256_hex(&nonce);

        let timestamp = Utc::now().timestamp_millis();
        let ticket = Self::for_device(capability, params, ticket_id, nonce, timestamp)?;
        info!(ticket_id = %ticket.ticket_id, "generated ticket");
        Ok(ticket)
    }

    /// Build this device's record for an existing `ticket_id`.
    pub(crate) fn for_device(
        capability: &dyn SigningCapability,
        params: &GroupParameters,
        ticket_id: String,
        nonce: [u8; NONCE_LENGTH],
        timestamp: i64,
    ) -> Result<Self, DerivationError> {
        let acc = derive_secret(capability, &ticket_id)?;
        let public_key = compute_public_key(params, &acc);
        Ok(Self {
            ticket_id,
            nonce,
            acc,
            public_keys: vec![public_key.clone()],
            public_key,
            timestamp,
            added_to_wallet: false,
            nfc_enabled: false,
        })
    }

    /// Append `key` to the registered keys unless already present.
    /// Returns `true` if the list changed.
    pub fn register_key(&mut self, key: BigUint) -> bool {
        if self.public_keys.contains(&key) {
            return false;
        }
        self.public_keys.push(key);
        true
    }

    /// True if the ID is the hash of the nonce (holds for generated tickets).
    pub fn id_matches_nonce(&self) -> bool {
        sha256_hex(&self.nonce) == self.ticket_id
    }

    /// Hex of this device's public key.
    pub fn public_key_hex(&self) -> String {
        self.public_key.to_str_radix(16)
    }
}

// Secrets stay out of debug output.
impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ticket")
            .field("ticket_id", &self.ticket_id)
            .field("nonce", &"<redacted>")
            .field("acc", &"<redacted>")
            .field("public_keys", &self.public_keys.len())
            .field("timestamp", &self.timestamp)
            .field("added_to_wallet", &self.added_to_wallet)
            .field("nfc_enabled", &self.nfc_enabled)
            .finish()
    }
}

/// Where a verification happened. Feeds the challenge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Degrees north.
    pub latitude: f64,
    /// Degrees east.
    pub longitude: f64,
}

impl Position {
    /// A position from coordinates.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}, {:?}", self.latitude, self.longitude)
    }
}

/// Outcome of one tap on the verifier side. Not persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Ticket the holder presented.
    pub ticket_id: String,
    /// Whether the signature checked out.
    pub is_valid: bool,
    /// Challenge sent, hex.
    pub challenge: String,
    /// When the challenge was built, Unix milliseconds.
    pub timestamp: i64,
    /// Where the challenge was built.
    pub location: Position,
    /// The scanned public key that verified, hex. `None` on rejection.
    pub matched_key: Option<String>,
}
