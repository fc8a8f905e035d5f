//! In-memory [`TicketRepository`].
//!
//! One `RwLock` guards the whole map, so moving the NFC flag from one
//! ticket to another happens under a single write guard.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use super::{sort_tickets, StorageError, StorageResult, TicketRepository};
use crate::ticket::Ticket;

/// Volatile ticket store. Lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    tickets: RwLock<HashMap<String, Ticket>>,
}

impl MemoryRepository {
    /// Empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tickets held.
    pub fn len(&self) -> usize {
        self.tickets.read().len()
    }

    /// True when no tickets are held.
    pub fn is_empty(&self) -> bool {
        self.tickets.read().is_empty()
    }
}

fn clear_flags_except(tickets: &mut HashMap<String, Ticket>, keep: &str) {
    for (id, ticket) in tickets.iter_mut() {
        if id != keep {
            ticket.nfc_enabled = false;
        }
    }
}

impl TicketRepository for MemoryRepository {
    fn get_all(&self) -> StorageResult<Vec<Ticket>> {
        let mut all: Vec<Ticket> = self.tickets.read().values().cloned().collect();
        sort_tickets(&mut all);
        Ok(all)
    }

    fn get(&self, ticket_id: &str) -> StorageResult<Option<Ticket>> {
        Ok(self.tickets.read().get(ticket_id).cloned())
    }

    fn save(&self, ticket: &Ticket) -> StorageResult<()> {
        let mut tickets = self.tickets.write();
        let enabled = tickets
            .get(&ticket.ticket_id)
            .map_or(false, |stored| stored.nfc_enabled);
        let mut stored = ticket.clone();
        stored.nfc_enabled = enabled;
        tickets.insert(ticket.ticket_id.clone(), stored);
        debug!(ticket_id = %ticket.ticket_id, "saved ticket");
        Ok(())
    }

    fn update(
        &self,
        ticket_id: &str,
        apply: &dyn Fn(&mut Ticket) -> bool,
    ) -> StorageResult<Option<Ticket>> {
        let mut tickets = self.tickets.write();
        let Some(stored) = tickets.get_mut(ticket_id) else {
            return Ok(None);
        };
        let mut candidate = stored.clone();
        if apply(&mut candidate) {
            candidate.nfc_enabled = stored.nfc_enabled;
            *stored = candidate;
            debug!(%ticket_id, "updated ticket");
        }
        Ok(Some(stored.clone()))
    }

    fn delete(&self, ticket_id: &str) -> StorageResult<()> {
        self.tickets.write().remove(ticket_id);
        Ok(())
    }

    fn set_exclusive_flag(&self, ticket_id: &str, enabled: bool) -> StorageResult<()> {
        let mut tickets = self.tickets.write();
        if !tickets.contains_key(ticket_id) {
            return Err(StorageError::NotFound(ticket_id.to_string()));
        }
        if enabled {
            clear_flags_except(&mut tickets, ticket_id);
        }
        if let Some(ticket) = tickets.get_mut(ticket_id) {
            ticket.nfc_enabled = enabled;
        }
        Ok(())
    }

    fn get_by_exclusive_flag(&self) -> StorageResult<Option<Ticket>> {
        Ok(self
            .tickets
            .read()
            .values()
            .find(|t| t.nfc_enabled)
            .cloned())
    }
}
