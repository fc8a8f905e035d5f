//! # Tap Sessions
//!
//! The two ends of a contactless exchange.
//!
//! ```text
//! responder.rs   holder state machine (Idle / Ready), one TapSession per SELECT
//! initiator.rs   verifier driver, PositionSource, ReaderMode
//! transport.rs   Transport / Tag seams, ConnectionGuard, in-process loopback
//! ```
//!
//! Neither side keeps anything between taps except the holder's
//! repository.

pub mod initiator;
pub mod responder;
pub mod transport;

mod error;

pub use error::SessionError;
pub use initiator::{FixedPosition, Initiator, PositionSource, ReaderMode};
pub use responder::{DeactivationReason, Responder, ResponderState, TapSession};
pub use transport::{
    ConnectionGuard, LoopbackTag, LoopbackTransport, SharedResponder, Tag, Transport,
};
