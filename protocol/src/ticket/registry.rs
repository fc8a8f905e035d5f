//! # Key Registry
//!
//! Moving a ticket between devices. The exporting device writes a JSON
//! document with the ticket ID and every public key it knows; the importing
//! device derives its *own* secret for that ID and appends its own key.
//! Secrets never appear in the document.
//!
//! ```json
//! {
//!   "ticketId": "9f86d0…",
//!   "timestamp": 1718000000000,
//!   "publicKeys": ["1a2b…", "3c4d…"],
//!   "P": "1a2b…"
//! }
//! ```
//!
//! `P` is the exporting device's own key. Older documents carry only `P`;
//! it is read as a one-element `publicKeys`.

use num_bigint::BigUint;
use num_traits::Num;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::model::Ticket;
use crate::config::NONCE_LENGTH;
use crate::crypto::{DerivationError, GroupParameters, SigningCapability};
use crate::storage::StorageError;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors from importing, exporting, and managing held tickets.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid export document: {0}")]
    InvalidDocument(String),

    #[error("invalid hex public key: {0}")]
    InvalidHex(String),

    #[error(transparent)]
    Derivation(#[from] DerivationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

// ---------------------------------------------------------------------------
// Export document
// ---------------------------------------------------------------------------

/// The JSON shape exchanged between devices.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDocument {
    #[serde(rename = "ticketId")]
    pub ticket_id: String,

    pub timestamp: i64,

    #[serde(
        rename = "publicKeys",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub public_keys: Option<Vec<String>>,

    /// Exporting device's own key. Always written; read only when
    /// `publicKeys` is absent.
    #[serde(rename = "P", default, skip_serializing_if = "Option::is_none")]
    pub legacy_key: Option<String>,
}

impl ExportDocument {
    /// Export view of `ticket`. Keys are lower-case hex without prefix.
    pub fn from_ticket(ticket: &Ticket) -> Self {
        Self {
            ticket_id: ticket.ticket_id.clone(),
            timestamp: ticket.timestamp,
            public_keys: Some(ticket.public_keys.iter().map(|k| k.to_str_radix(16)).collect()),
            legacy_key: Some(ticket.public_key.to_str_radix(16)),
        }
    }

    /// Parse a JSON document.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InvalidDocument`] if the JSON is malformed, misses
    /// `ticketId`/`timestamp`, or carries neither `publicKeys` nor `P`.
    pub fn parse(json: &str) -> Result<Self, RegistryError> {
        let doc: Self =
            serde_json::from_str(json).map_err(|e| RegistryError::InvalidDocument(e.to_string()))?;
        if doc.ticket_id.is_empty() {
            return Err(RegistryError::InvalidDocument("empty ticketId".to_string()));
        }
        if doc.public_keys.is_none() && doc.legacy_key.is_none() {
            return Err(RegistryError::InvalidDocument(
                "neither publicKeys nor P present".to_string(),
            ));
        }
        Ok(doc)
    }

    /// Serialize to compact JSON.
    pub fn to_json(&self) -> Result<String, RegistryError> {
        serde_json::to_string(self).map_err(|e| RegistryError::InvalidDocument(e.to_string()))
    }

    /// The registered keys, decoded. `publicKeys` wins over `P`.
    /// Duplicates are dropped, first occurrence kept.
    pub fn keys(&self) -> Result<Vec<BigUint>, RegistryError> {
        let raw: Vec<&str> = match (&self.public_keys, &self.legacy_key) {
            (Some(keys), _) => keys.iter().map(String::as_str).collect(),
            (None, Some(p)) => vec![p.as_str()],
            (None, None) => Vec::new(),
        };

        let mut keys = Vec::with_capacity(raw.len());
        for hex_key in raw {
            let key = parse_hex_key(hex_key)?;
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

fn parse_hex_key(hex_key: &str) -> Result<BigUint, RegistryError> {
    let trimmed = hex_key.trim();
    if trimmed.is_empty() {
        return Err(RegistryError::InvalidHex(hex_key.to_string()));
    }
    BigUint::from_str_radix(trimmed, 16).map_err(|_| RegistryError::InvalidHex(hex_key.to_string()))
}

// ---------------------------------------------------------------------------
// Import / export
// ---------------------------------------------------------------------------

/// Export `ticket` as a document.
pub fn export(ticket: &Ticket) -> ExportDocument {
    debug!(ticket_id = %ticket.ticket_id, keys = ticket.public_keys.len(), "exporting ticket");
    ExportDocument::from_ticket(ticket)
}

/// Build this device's copy of an exported ticket.
///
/// The document's keys are kept in order, this device's own key is
/// appended if missing, a fresh local nonce is drawn, and both flags start
/// cleared. Nothing is persisted here.
pub fn import(
    capability: &dyn SigningCapability,
    params: &GroupParameters,
    doc: &ExportDocument,
) -> Result<Ticket, RegistryError> {
    let existing = doc.keys()?;

    let mut nonce = [0u8; NONCE_LENGTH];
    OsRng.fill_bytes(&mut nonce);
    let mut ticket = Ticket::for_device(
        capability,
        params,
        doc.ticket_id.clone(),
        nonce,
        doc.timestamp,
    )?;

    let own = ticket.public_key.clone();
    ticket.public_keys = existing;
    if ticket.register_key(own) {
        info!(
            ticket_id = %ticket.ticket_id,
            keys = ticket.public_keys.len(),
            "registered this device's key"
        );
    }
    Ok(ticket)
}
