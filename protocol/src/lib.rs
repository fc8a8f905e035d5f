// Copyright (c) 2026 TapTicket Contributors. MIT License.
// See LICENSE for details.

//! # TapTicket Protocol: Core Library
//!
//! An anonymous, offline ticket credential carried over a contactless
//! link. A holder device proves it owns a secret bound to a ticket ID; a
//! verifier device checks the proof without a network and without learning
//! the secret.
//!
//! ## Architecture
//!
//! - **crypto**: group parameters, SHA-256 helpers, per-device secret
//!   derivation, Schnorr challenge-response.
//! - **wire**: byte-exact APDU framing for SELECT, GET_TICKET_META, and
//!   CHALLENGE.
//! - **ticket**: the `Ticket` record, export/import between devices, and
//!   the holder's `TicketWallet`.
//! - **storage**: the ticket repository contract with in-memory and sled
//!   backends.
//! - **session**: the holder `Responder`, the verifier `Initiator`, and the
//!   transport seam between them.
//! - **config**: protocol constants.
//!
//! ## Quick look
//!
//! ```no_run
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use tapticket_protocol::crypto::SoftwareSigningCapability;
//! use tapticket_protocol::session::{FixedPosition, Initiator, LoopbackTag, Responder};
//! use tapticket_protocol::storage::MemoryRepository;
//! use tapticket_protocol::ticket::TicketWallet;
//!
//! let repo = Arc::new(MemoryRepository::new());
//! let device = Arc::new(SoftwareSigningCapability::generate());
//! let wallet = TicketWallet::new(Arc::clone(&repo), device);
//! let ticket = wallet.generate().unwrap();
//! wallet.set_nfc_enabled(&ticket.ticket_id, true).unwrap();
//!
//! let holder = Arc::new(Mutex::new(Responder::new(repo)));
//! let verifier = Initiator::new(Arc::new(FixedPosition::default()));
//! let result = verifier.verify_tag(&LoopbackTag::new(holder)).unwrap();
//! assert!(result.is_valid);
//! ```

pub mod config;
pub mod crypto;
pub mod session;
pub mod storage;
pub mod ticket;
pub mod wire;
