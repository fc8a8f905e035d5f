//! # Ticket Storage
//!
//! Local persistence for the tickets this device holds.
//!
//! ## Architecture
//!
//! ```text
//! mod.rs      TicketRepository trait, StorageError
//! memory.rs   MemoryRepository: one RwLock over a map, for tests and demos
//! db.rs       SledRepository: public records and secrets in separate trees
//! ```
//!
//! ## Exclusivity
//!
//! At most one ticket per device is NFC-enabled. Both backends make that
//! hold at every point a reader could observe: enabling one ticket and
//! clearing every other flag is a single atomic step.
//! [`TicketRepository::set_exclusive_flag`] is the only writer of the flag;
//! `save` and `update` leave it as stored, so a stale copy of a ticket can
//! never switch activation on or off.

pub mod db;
pub mod memory;

pub use db::SledRepository;
pub use memory::MemoryRepository;

use std::sync::Arc;

use crate::ticket::Ticket;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors raised by a [`TicketRepository`].
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("ticket not found: {0}")]
    NotFound(String),

    /// A record exists but is unusable (public half without secrets, or
    /// the other way round).
    #[error("corrupt record for ticket {0}")]
    Corrupt(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Persistent store of this device's tickets, keyed by ticket ID.
pub trait TicketRepository: Send + Sync {
    /// Every ticket, oldest first.
    fn get_all(&self) -> StorageResult<Vec<Ticket>>;

    /// One ticket, or `None`.
    fn get(&self, ticket_id: &str) -> StorageResult<Option<Ticket>>;

    /// Insert or replace. The ticket's `nfc_enabled` field is ignored: an
    /// existing ticket keeps its stored flag, a new one starts disabled.
    fn save(&self, ticket: &Ticket) -> StorageResult<()>;

    /// Read-modify-write one ticket as a single atomic step. `apply`
    /// returns whether it changed anything; nothing is written otherwise.
    /// `apply` may run more than once and must not depend on outside
    /// state it mutates. Changes to `nfc_enabled` are discarded.
    ///
    /// Returns the ticket as stored afterwards, or `None` if it does not
    /// exist.
    fn update(
        &self,
        ticket_id: &str,
        apply: &dyn Fn(&mut Ticket) -> bool,
    ) -> StorageResult<Option<Ticket>>;

    /// Remove a ticket. Removing an unknown ID is not an error.
    fn delete(&self, ticket_id: &str) -> StorageResult<()>;

    /// Set or clear the NFC-enabled flag. Enabling clears every other
    /// ticket's flag atomically.
    ///
    /// # Errors
    ///
    /// [`StorageError::NotFound`] if the ticket does not exist.
    fn set_exclusive_flag(&self, ticket_id: &str, enabled: bool) -> StorageResult<()>;

    /// The ticket the holder will present on the next tap.
    fn get_by_exclusive_flag(&self) -> StorageResult<Option<Ticket>>;
}

impl<T: TicketRepository + ?Sized> TicketRepository for Arc<T> {
    fn get_all(&self) -> StorageResult<Vec<Ticket>> {
        (**self).get_all()
    }

    fn get(&self, ticket_id: &str) -> StorageResult<Option<Ticket>> {
        (**self).get(ticket_id)
    }

    fn save(&self, ticket: &Ticket) -> StorageResult<()> {
        (**self).save(ticket)
    }

    fn update(
        &self,
        ticket_id: &str,
        apply: &dyn Fn(&mut Ticket) -> bool,
    ) -> StorageResult<Option<Ticket>> {
        (**self).update(ticket_id, apply)
    }

    fn delete(&self, ticket_id: &str) -> StorageResult<()> {
        (**self).delete(ticket_id)
    }

    fn set_exclusive_flag(&self, ticket_id: &str, enabled: bool) -> StorageResult<()> {
        (**self).set_exclusive_flag(ticket_id, enabled)
    }

    fn get_by_exclusive_flag(&self) -> StorageResult<Option<Ticket>> {
        (**self).get_by_exclusive_flag()
    }
}

/// Oldest first, ties broken by ID, so both backends list identically.
pub(crate) fn sort_tickets(tickets: &mut [Ticket]) {
    tickets.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.ticket_id.cmp(&b.ticket_id))
    });
}

// ---------------------------------------------------------------------------
// Shared behaviour tests
// ---------------------------------------------------------------------------

/// Checks every backend must pass. Each backend's test module calls these
/// with a fresh repository.
#[cfg(test)]
pub(crate) mod conformance {
    use num_bigint::BigUint;

    use super::*;

    pub(crate) fn ticket(id: &str, timestamp: i64) -> Ticket {
        Ticket {
            ticket_id: id.to_string(),
            nonce: [timestamp as u8; 32],
            acc: BigUint::from(7u32),
            public_key: BigUint::from(8u32),
            public_keys: vec![BigUint::from(8u32), BigUint::from(9u32)],
            timestamp,
            added_to_wallet: false,
            nfc_enabled: false,
        }
    }

    fn enabled_ids(repo: &dyn TicketRepository) -> Vec<String> {
        repo.get_all()
            .unwrap()
            .into_iter()
            .filter(|t| t.nfc_enabled)
            .map(|t| t.ticket_id)
            .collect()
    }

    pub(crate) fn save_and_get(repo: &dyn TicketRepository) {
        let t = ticket("a", 1);
        repo.save(&t).unwrap();
        assert_eq!(repo.get("a").unwrap(), Some(t));
        assert_eq!(repo.get("missing").unwrap(), None);
    }

    pub(crate) fn save_replaces(repo: &dyn TicketRepository) {
        let mut t = ticket("a", 1);
        repo.save(&t).unwrap();
        t.added_to_wallet = true;
        t.public_keys.push(BigUint::from(10u32));
        repo.save(&t).unwrap();
        assert_eq!(repo.get_all().unwrap(), vec![t]);
    }

    pub(crate) fn lists_oldest_first(repo: &dyn TicketRepository) {
        repo.save(&ticket("c", 30)).unwrap();
        repo.save(&ticket("a", 10)).unwrap();
        repo.save(&ticket("b", 20)).unwrap();
        let ids: Vec<_> = repo
            .get_all()
            .unwrap()
            .into_iter()
            .map(|t| t.ticket_id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    pub(crate) fn delete_is_idempotent(repo: &dyn TicketRepository) {
        repo.save(&ticket("a", 1)).unwrap();
        repo.delete("a").unwrap();
        repo.delete("a").unwrap();
        assert_eq!(repo.get("a").unwrap(), None);
        assert!(repo.get_all().unwrap().is_empty());
    }

    pub(crate) fn exclusive_flag_moves(repo: &dyn TicketRepository) {
        repo.save(&ticket("a", 1)).unwrap();
        repo.save(&ticket("b", 2)).unwrap();
        repo.save(&ticket("c", 3)).unwrap();

        repo.set_exclusive_flag("a", true).unwrap();
        assert_eq!(enabled_ids(repo), vec!["a"]);

        repo.set_exclusive_flag("b", true).unwrap();
        assert_eq!(enabled_ids(repo), vec!["b"]);
        assert_eq!(
            repo.get_by_exclusive_flag().unwrap().map(|t| t.ticket_id),
            Some("b".to_string())
        );

        repo.set_exclusive_flag("b", false).unwrap();
        assert!(enabled_ids(repo).is_empty());
        assert_eq!(repo.get_by_exclusive_flag().unwrap(), None);
    }

    pub(crate) fn disabling_other_ticket_keeps_active(repo: &dyn TicketRepository) {
        repo.save(&ticket("a", 1)).unwrap();
        repo.save(&ticket("b", 2)).unwrap();
        repo.set_exclusive_flag("a", true).unwrap();
        repo.set_exclusive_flag("b", false).unwrap();
        assert_eq!(enabled_ids(repo), vec!["a"]);
    }

    pub(crate) fn flag_on_missing_ticket(repo: &dyn TicketRepository) {
        repo.save(&ticket("a", 1)).unwrap();
        repo.set_exclusive_flag("a", true).unwrap();
        assert!(matches!(
            repo.set_exclusive_flag("ghost", true),
            Err(StorageError::NotFound(_))
        ));
        assert_eq!(enabled_ids(repo), vec!["a"]);
    }

    pub(crate) fn save_never_moves_the_flag(repo: &dyn TicketRepository) {
        repo.save(&ticket("a", 1)).unwrap();
        let stale = repo.get("a").unwrap().unwrap();
        repo.set_exclusive_flag("a", true).unwrap();

        // A copy read before activation does not switch it off.
        repo.save(&stale).unwrap();
        assert_eq!(enabled_ids(repo), vec!["a"]);

        // A copy claiming to be enabled does not steal the flag.
        let mut b = ticket("b", 2);
        b.nfc_enabled = true;
        repo.save(&b).unwrap();
        assert_eq!(enabled_ids(repo), vec!["a"]);
        assert!(!repo.get("b").unwrap().unwrap().nfc_enabled);
    }

    pub(crate) fn update_modifies_in_place(repo: &dyn TicketRepository) {
        repo.save(&ticket("a", 1)).unwrap();
        repo.set_exclusive_flag("a", true).unwrap();

        let updated = repo
            .update("a", &|t| {
                t.added_to_wallet = true;
                t.nfc_enabled = false;
                true
            })
            .unwrap()
            .unwrap();
        assert!(updated.added_to_wallet);
        assert!(updated.nfc_enabled);
        assert_eq!(repo.get("a").unwrap(), Some(updated));
        assert_eq!(enabled_ids(repo), vec!["a"]);
    }

    pub(crate) fn update_without_change_writes_nothing(repo: &dyn TicketRepository) {
        repo.save(&ticket("a", 1)).unwrap();
        let unchanged = repo
            .update("a", &|t| {
                t.added_to_wallet = true;
                false
            })
            .unwrap()
            .unwrap();
        assert!(!unchanged.added_to_wallet);
        assert!(!repo.get("a").unwrap().unwrap().added_to_wallet);
    }

    pub(crate) fn update_of_missing_ticket(repo: &dyn TicketRepository) {
        assert_eq!(repo.update("ghost", &|_| true).unwrap(), None);
        assert!(repo.get_all().unwrap().is_empty());
    }

    pub(crate) fn deleting_active_ticket_clears_active(repo: &dyn TicketRepository) {
        repo.save(&ticket("a", 1)).unwrap();
        repo.set_exclusive_flag("a", true).unwrap();
        repo.delete("a").unwrap();
        assert_eq!(repo.get_by_exclusive_flag().unwrap(), None);
        // Re-importing the same ID must not resurrect the old flag.
        repo.save(&ticket("a", 1)).unwrap();
        assert_eq!(repo.get_by_exclusive_flag().unwrap(), None);
    }

    pub(crate) fn run_all(make: impl Fn() -> Box<dyn TicketRepository>) {
        save_and_get(&*make());
        save_replaces(&*make());
        lists_oldest_first(&*make());
        delete_is_idempotent(&*make());
        exclusive_flag_moves(&*make());
        disabling_other_ticket_keeps_active(&*make());
        flag_on_missing_ticket(&*make());
        save_never_moves_the_flag(&*make());
        update_modifies_in_place(&*make());
        update_without_change_writes_nothing(&*make());
        update_of_missing_ticket(&*make());
        deleting_active_ticket_clears_active(&*make());
    }
}
