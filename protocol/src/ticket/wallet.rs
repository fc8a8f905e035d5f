//! # Ticket Wallet
//!
//! Holder-side entry point: every lifecycle operation on the tickets this
//! device holds goes through a [`TicketWallet`]. The wallet owns nothing
//! but handles. The repository and the device signing capability are
//! injected, so the same code runs over sled in the CLI and over memory in
//! tests.
//!
//! Secret derivation always happens before anything is written. A device
//! whose key store is unavailable gets an error and an unchanged
//! repository.

use std::cell::Cell;
use std::sync::Arc;

use num_bigint::BigUint;
use tracing::info;

use super::model::Ticket;
use super::registry::{self, ExportDocument, RegistryError};
use crate::crypto::{GroupParameters, SigningCapability};
use crate::storage::{StorageError, TicketRepository};

/// Holder façade over a [`TicketRepository`].
pub struct TicketWallet<R: TicketRepository> {
    repository: R,
    capability: Arc<dyn SigningCapability>,
    params: GroupParameters,
}

impl<R: TicketRepository> TicketWallet<R> {
    /// Wallet over the production group.
    pub fn new(repository: R, capability: Arc<dyn SigningCapability>) -> Self {
        Self::with_params(repository, capability, GroupParameters::rfc3526().clone())
    }

    /// Wallet over an explicit group.
    pub fn with_params(
        repository: R,
        capability: Arc<dyn SigningCapability>,
        params: GroupParameters,
    ) -> Self {
        Self {
            repository,
            capability,
            params,
        }
    }

    /// The underlying repository.
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Group the wallet derives keys in.
    pub fn params(&self) -> &GroupParameters {
        &self.params
    }

    /// Create and store a new ticket.
    pub fn generate(&self) -> Result<Ticket, RegistryError> {
        let ticket = Ticket::generate(self.capability.as_ref(), &self.params)?;
        self.repository.save(&ticket)?;
        Ok(ticket)
    }

    /// Import a ticket exported by another device and store this device's
    /// copy.
    ///
    /// Re-importing a ticket already held only merges the document's keys
    /// into the stored key set. The held nonce, secret and flags stay as
    /// they are.
    pub fn import_json(&self, json: &str) -> Result<Ticket, RegistryError> {
        let doc = ExportDocument::parse(json)?;
        let keys = doc.keys()?;

        let merged = self.repository.update(&doc.ticket_id, &|held| {
            keys.iter()
                .fold(false, |changed, key| held.register_key(key.clone()) || changed)
        })?;
        if let Some(held) = merged {
            info!(
                ticket_id = %held.ticket_id,
                keys = held.public_keys.len(),
                "merged re-imported ticket"
            );
            return Ok(held);
        }

        let ticket = registry::import(self.capability.as_ref(), &self.params, &doc)?;
        self.repository.save(&ticket)?;
        info!(ticket_id = %ticket.ticket_id, keys = ticket.public_keys.len(), "imported ticket");
        Ok(ticket)
    }

    /// Export a held ticket as JSON.
    pub fn export_json(&self, ticket_id: &str) -> Result<String, RegistryError> {
        let ticket = self.require(ticket_id)?;
        registry::export(&ticket).to_json()
    }

    /// All held tickets, oldest first.
    pub fn list(&self) -> Result<Vec<Ticket>, RegistryError> {
        Ok(self.repository.get_all()?)
    }

    /// One held ticket.
    pub fn get(&self, ticket_id: &str) -> Result<Option<Ticket>, RegistryError> {
        Ok(self.repository.get(ticket_id)?)
    }

    /// Flag a ticket as added to the holder's wallet.
    pub fn mark_added_to_wallet(&self, ticket_id: &str) -> Result<(), RegistryError> {
        self.repository
            .update(ticket_id, &|ticket| {
                !std::mem::replace(&mut ticket.added_to_wallet, true)
            })?
            .ok_or_else(|| not_found(ticket_id))?;
        Ok(())
    }

    /// Make `ticket_id` the one presented on the next tap, or stop
    /// presenting it. Enabling one ticket disables every other.
    pub fn set_nfc_enabled(&self, ticket_id: &str, enabled: bool) -> Result<(), RegistryError> {
        self.repository.set_exclusive_flag(ticket_id, enabled)?;
        info!(%ticket_id, enabled, "nfc presentation updated");
        Ok(())
    }

    /// The ticket currently presented on taps.
    pub fn active(&self) -> Result<Option<Ticket>, RegistryError> {
        Ok(self.repository.get_by_exclusive_flag()?)
    }

    /// Register another device's public key against a held ticket.
    /// Returns `true` if the key was new.
    pub fn register_key(&self, ticket_id: &str, key: BigUint) -> Result<bool, RegistryError> {
        let added = Cell::new(false);
        self.repository
            .update(ticket_id, &|ticket| {
                added.set(ticket.register_key(key.clone()));
                added.get()
            })?
            .ok_or_else(|| not_found(ticket_id))?;
        Ok(added.get())
    }

    /// Delete a ticket, secrets included.
    pub fn delete(&self, ticket_id: &str) -> Result<(), RegistryError> {
        self.repository.delete(ticket_id)?;
        info!(%ticket_id, "deleted ticket");
        Ok(())
    }

    fn require(&self, ticket_id: &str) -> Result<Ticket, RegistryError> {
        self.repository
            .get(ticket_id)?
            .ok_or_else(|| not_found(ticket_id))
    }
}

fn not_found(ticket_id: &str) -> RegistryError {
    StorageError::NotFound(ticket_id.to_string()).into()
}
