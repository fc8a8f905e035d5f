//! # SledRepository: Persistent Ticket Store
//!
//! Durable [`TicketRepository`] on sled's embedded key-value store.
//!
//! ## Tree Layout
//!
//! | Tree             | Key                 | Value                  |
//! |------------------|---------------------|------------------------|
//! | `ticket_public`  | `ticket_id` (UTF-8) | `bincode(PublicRecord)`|
//! | `ticket_secrets` | `ticket_id` (UTF-8) | `bincode(SecretRecord)`|
//! | `ticket_meta`    | key (UTF-8)         | value (bytes)          |
//!
//! Public metadata and secret material live in different trees so a
//! platform port can put the secrets tree behind stronger protection
//! without touching the rest.
//!
//! ## Atomicity
//!
//! The NFC-enabled flag is not stored per ticket. `ticket_meta` holds one
//! `active_ticket` pointer, so two enabled tickets cannot be represented at
//! all. Every write that touches more than one tree runs as a sled
//! multi-tree transaction: either everything lands or nothing does.

use std::path::Path;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionResult, Transactional,
};
use sled::{Db, IVec, Tree};
use tracing::{debug, warn};

use super::{sort_tickets, StorageError, StorageResult, TicketRepository};
use crate::config::NONCE_LENGTH;
use crate::ticket::Ticket;

// ---------------------------------------------------------------------------
// Metadata Keys
// ---------------------------------------------------------------------------

/// Key in `ticket_meta` naming the NFC-enabled ticket.
const META_ACTIVE_TICKET: &[u8] = b"active_ticket";

// ---------------------------------------------------------------------------
// On-disk records
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct PublicRecord {
    ticket_id: String,
    public_key: Vec<u8>,
    public_keys: Vec<Vec<u8>>,
    timestamp: i64,
    added_to_wallet: bool,
}

#[derive(Serialize, Deserialize)]
struct SecretRecord {
    nonce: [u8; NONCE_LENGTH],
    acc: Vec<u8>,
}

fn encode<T: Serialize>(value: &T) -> StorageResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> StorageResult<T> {
    bincode::deserialize(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn split(ticket: &Ticket) -> StorageResult<(Vec<u8>, Vec<u8>)> {
    let public = PublicRecord {
        ticket_id: ticket.ticket_id.clone(),
        public_key: ticket.public_key.to_bytes_be(),
        public_keys: ticket.public_keys.iter().map(BigUint::to_bytes_be).collect(),
        timestamp: ticket.timestamp,
        added_to_wallet: ticket.added_to_wallet,
    };
    let secret = SecretRecord {
        nonce: ticket.nonce,
        acc: ticket.acc.to_bytes_be(),
    };
    Ok((encode(&public)?, encode(&secret)?))
}

fn join(public: &[u8], secret: &[u8], nfc_enabled: bool) -> StorageResult<Ticket> {
    let public: PublicRecord = decode(public)?;
    let secret: SecretRecord = decode(secret)?;
    Ok(Ticket {
        ticket_id: public.ticket_id,
        nonce: secret.nonce,
        acc: BigUint::from_bytes_be(&secret.acc),
        public_key: BigUint::from_bytes_be(&public.public_key),
        public_keys: public
            .public_keys
            .iter()
            .map(|k| BigUint::from_bytes_be(k))
            .collect(),
        timestamp: public.timestamp,
        added_to_wallet: public.added_to_wallet,
        nfc_enabled,
    })
}

fn flatten<T>(result: TransactionResult<T, StorageError>) -> StorageResult<T> {
    result.map_err(|e| match e {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => StorageError::Sled(e),
    })
}

fn is_active(active: Option<&IVec>, ticket_id: &str) -> bool {
    active.map_or(false, |a| &a[..] == ticket_id.as_bytes())
}

// ---------------------------------------------------------------------------
// SledRepository
// ---------------------------------------------------------------------------

/// Durable ticket store.
///
/// sled trees are safe for concurrent use, so a `SledRepository` can be
/// shared behind an `Arc` without extra locking.
#[derive(Debug, Clone)]
pub struct SledRepository {
    db: Db,
    public: Tree,
    secrets: Tree,
    meta: Tree,
}

impl SledRepository {
    /// Open or create a store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A store that lives only as long as this value. For tests.
    pub fn open_temporary() -> StorageResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StorageResult<Self> {
        let public = db.open_tree("ticket_public")?;
        let secrets = db.open_tree("ticket_secrets")?;
        let meta = db.open_tree("ticket_meta")?;
        Ok(Self {
            db,
            public,
            secrets,
            meta,
        })
    }

    /// Number of stored tickets.
    pub fn len(&self) -> usize {
        self.public.len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.public.is_empty()
    }

    fn active_id(&self) -> StorageResult<Option<IVec>> {
        Ok(self.meta.get(META_ACTIVE_TICKET)?)
    }
}

impl TicketRepository for SledRepository {
    fn get_all(&self) -> StorageResult<Vec<Ticket>> {
        let active = self.active_id()?;
        let mut all = Vec::with_capacity(self.public.len());
        for item in self.public.iter() {
            let (key, public) = item?;
            let ticket_id = String::from_utf8_lossy(&key).into_owned();
            let Some(secret) = self.secrets.get(&key)? else {
                warn!(%ticket_id, "skipping ticket without secret record");
                continue;
            };
            all.push(join(&public, &secret, is_active(active.as_ref(), &ticket_id))?);
        }
        sort_tickets(&mut all);
        Ok(all)
    }

    fn get(&self, ticket_id: &str) -> StorageResult<Option<Ticket>> {
        let key = ticket_id.as_bytes();
        let (public, secret, active) = flatten(
            (&self.public, &self.secrets, &self.meta).transaction(
                |(public, secrets, meta)| -> ConflictableTransactionResult<
                    (Option<IVec>, Option<IVec>, Option<IVec>),
                    StorageError,
                > {
                    Ok((
                        public.get(key)?,
                        secrets.get(key)?,
                        meta.get(META_ACTIVE_TICKET)?,
                    ))
                },
            ),
        )?;

        match (public, secret) {
            (Some(public), Some(secret)) => Ok(Some(join(
                &public,
                &secret,
                is_active(active.as_ref(), ticket_id),
            )?)),
            (None, None) => Ok(None),
            _ => Err(StorageError::Corrupt(ticket_id.to_string())),
        }
    }

    fn save(&self, ticket: &Ticket) -> StorageResult<()> {
        let (public_bytes, secret_bytes) = split(ticket)?;
        let key = ticket.ticket_id.as_bytes();

        flatten((&self.public, &self.secrets).transaction(
            |(public, secrets)| -> ConflictableTransactionResult<(), StorageError> {
                public.insert(key, public_bytes.as_slice())?;
                secrets.insert(key, secret_bytes.as_slice())?;
                Ok(())
            },
        ))?;
        self.db.flush()?;
        debug!(ticket_id = %ticket.ticket_id, "saved ticket");
        Ok(())
    }

    fn update(
        &self,
        ticket_id: &str,
        apply: &dyn Fn(&mut Ticket) -> bool,
    ) -> StorageResult<Option<Ticket>> {
        let key = ticket_id.as_bytes();
        let (updated, changed) = flatten(
            (&self.public, &self.secrets, &self.meta).transaction(
                |(public, secrets, meta)| -> ConflictableTransactionResult<
                    (Option<Ticket>, bool),
                    StorageError,
                > {
                    let stored = (public.get(key)?, secrets.get(key)?);
                    let (stored_public, stored_secret) = match stored {
                        (Some(p), Some(s)) => (p, s),
                        (None, None) => return Ok((None, false)),
                        _ => {
                            return Err(ConflictableTransactionError::Abort(
                                StorageError::Corrupt(ticket_id.to_string()),
                            ))
                        }
                    };
                    let enabled = is_active(meta.get(META_ACTIVE_TICKET)?.as_ref(), ticket_id);
                    let mut ticket = join(&stored_public, &stored_secret, enabled)
                        .map_err(ConflictableTransactionError::Abort)?;
                    let changed = apply(&mut ticket);
                    ticket.nfc_enabled = enabled;
                    if changed {
                        let (public_bytes, secret_bytes) =
                            split(&ticket).map_err(ConflictableTransactionError::Abort)?;
                        public.insert(key, public_bytes)?;
                        secrets.insert(key, secret_bytes)?;
                    }
                    Ok((Some(ticket), changed))
                },
            ),
        )?;
        if changed {
            self.db.flush()?;
            debug!(%ticket_id, "updated ticket");
        }
        Ok(updated)
    }

    fn delete(&self, ticket_id: &str) -> StorageResult<()> {
        let key = ticket_id.as_bytes();
        flatten(
            (&self.public, &self.secrets, &self.meta).transaction(
                |(public, secrets, meta)| -> ConflictableTransactionResult<(), StorageError> {
                    public.remove(key)?;
                    secrets.remove(key)?;
                    if is_active(meta.get(META_ACTIVE_TICKET)?.as_ref(), ticket_id) {
                        meta.remove(META_ACTIVE_TICKET)?;
                    }
                    Ok(())
                },
            ),
        )?;
        self.db.flush()?;
        debug!(%ticket_id, "deleted ticket");
        Ok(())
    }

    fn set_exclusive_flag(&self, ticket_id: &str, enabled: bool) -> StorageResult<()> {
        let key = ticket_id.as_bytes();
        flatten((&self.public, &self.meta).transaction(
            |(public, meta)| -> ConflictableTransactionResult<(), StorageError> {
                if public.get(key)?.is_none() {
                    return Err(ConflictableTransactionError::Abort(StorageError::NotFound(
                        ticket_id.to_string(),
                    )));
                }
                if enabled {
                    meta.insert(META_ACTIVE_TICKET, key)?;
                } else if is_active(meta.get(META_ACTIVE_TICKET)?.as_ref(), ticket_id) {
                    meta.remove(META_ACTIVE_TICKET)?;
                }
                Ok(())
            },
        ))?;
        self.db.flush()?;
        debug!(%ticket_id, enabled, "nfc flag updated");
        Ok(())
    }

    fn get_by_exclusive_flag(&self) -> StorageResult<Option<Ticket>> {
        match self.active_id()? {
            Some(id) => {
                let ticket_id = String::from_utf8_lossy(&id).into_owned();
                self.get(&ticket_id)
            }
            None => Ok(None),
        }
    }
}
