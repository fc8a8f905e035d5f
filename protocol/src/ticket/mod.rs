//! # Ticket Module
//!
//! The credential itself and everything the holder does with it.
//!
//! ```text
//! model.rs      Ticket, Position, VerificationResult
//! registry.rs   export/import documents for multi-device sharing
//! wallet.rs     TicketWallet: generate, import, activate, delete
//! ```

pub mod model;
pub mod registry;
pub mod wallet;

pub use model::{Position, Ticket, VerificationResult};
pub use registry::{export, import, ExportDocument, RegistryError};
pub use wallet::TicketWallet;
