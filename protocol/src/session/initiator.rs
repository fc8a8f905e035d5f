//! # Initiator
//!
//! Verifier side of a tap. [`Initiator::verify_tag`] runs the whole exchange
//! against one tag and reports what it saw:
//!
//! 1. connect, bound every frame by the transceive timeout
//! 2. SELECT our application
//! 3. GET_TICKET_META for the ticket ID and the holder's public key
//! 4. build a challenge from the current time and position, reduced mod `q`
//! 5. CHALLENGE, then check the returned `(S, R)` against the scanned key
//!
//! The transport is closed on every exit path. Only the key scanned in this
//! tap is checked; registered keys held elsewhere are not consulted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::error::SessionError;
use super::transport::{ConnectionGuard, Tag};
use crate::config::TRANSCEIVE_TIMEOUT;
use crate::crypto::{compute_challenge, reduce_challenge, verify_signature, GroupParameters};
use crate::ticket::{Position, VerificationResult};
use crate::wire::{decode_signature, split_status, Command, TicketMeta};

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// Where the verifier currently is.
pub trait PositionSource: Send + Sync {
    /// Current position.
    fn current(&self) -> Position;
}

/// A position that never changes.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedPosition(pub Position);

impl PositionSource for FixedPosition {
    fn current(&self) -> Position {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Initiator
// ---------------------------------------------------------------------------

/// Verifier-side protocol driver. Holds no per-tap state.
pub struct Initiator {
    params: GroupParameters,
    position: Arc<dyn PositionSource>,
    timeout: Duration,
}

impl Initiator {
    /// Initiator over the production group.
    pub fn new(position: Arc<dyn PositionSource>) -> Self {
        Self::with_params(GroupParameters::rfc3526().clone(), position)
    }

    /// Initiator over an explicit group.
    pub fn with_params(params: GroupParameters, position: Arc<dyn PositionSource>) -> Self {
        Self {
            params,
            position,
            timeout: TRANSCEIVE_TIMEOUT,
        }
    }

    /// Override the per-frame timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Per-frame timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one full exchange with `tag`.
    ///
    /// A holder whose signature does not check out yields
    /// `Ok(VerificationResult { is_valid: false, .. })`.
    ///
    /// # Errors
    ///
    /// - [`SessionError::TransportUnavailable`] if the tag offers no transport.
    /// - [`SessionError::Transport`] / [`SessionError::Timeout`] on link failure.
    /// - [`SessionError::ProtocolError`] if the holder refuses a step or
    ///   answers with something undecodable.
    pub fn verify_tag(&self, tag: &dyn Tag) -> Result<VerificationResult, SessionError> {
        let transport = tag.transport().ok_or(SessionError::TransportUnavailable)?;
        debug!(tag = %hex::encode(tag.id()), "tag discovered");

        let mut link = ConnectionGuard::new(transport);
        link.open(self.timeout)?;

        let response = link.transceive(&Command::select().encode())?;
        split_status(&response).map_err(|e| step_failed("SELECT", e))?;

        let response = link.transceive(&Command::GetTicketMeta.encode())?;
        let meta = TicketMeta::decode(&response).map_err(|e| step_failed("GET_TICKET_META", e))?;
        debug!(ticket_id = %meta.ticket_id, "ticket meta received");

        let timestamp = Utc::now().timestamp_millis();
        let location = self.position.current();
        let challenge = reduce_challenge(
            &self.params,
            &compute_challenge(timestamp, location.latitude, location.longitude),
        );

        let response = link.transceive(&Command::challenge(&challenge)?.encode())?;
        let signature = decode_signature(&response).map_err(|e| step_failed("CHALLENGE", e))?;

        let is_valid = verify_signature(&self.params, &meta.public_key, &challenge, &signature);
        if is_valid {
            info!(ticket_id = %meta.ticket_id, "ticket verified");
        } else {
            warn!(ticket_id = %meta.ticket_id, "ticket signature rejected");
        }

        Ok(VerificationResult {
            ticket_id: meta.ticket_id,
            is_valid,
            challenge: challenge.to_str_radix(16),
            timestamp,
            location,
            matched_key: is_valid.then(|| meta.public_key.to_str_radix(16)),
        })
    }
}

fn step_failed(step: &str, error: impl std::fmt::Display) -> SessionError {
    SessionError::ProtocolError(format!("{step} failed: {error}"))
}

// ---------------------------------------------------------------------------
// Reader mode
// ---------------------------------------------------------------------------

/// Gate in front of an [`Initiator`] that the UI turns on and off.
///
/// Disabling only flips a flag. A tap already in flight runs on until its
/// next frame times out; its transport is still closed.
pub struct ReaderMode {
    initiator: Initiator,
    enabled: AtomicBool,
}

impl ReaderMode {
    /// Reader mode around `initiator`, initially disabled.
    pub fn new(initiator: Initiator) -> Self {
        Self {
            initiator,
            enabled: AtomicBool::new(false),
        }
    }

    /// Start handling discovered tags.
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
        debug!("reader mode enabled");
    }

    /// Stop handling discovered tags.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        debug!("reader mode disabled");
    }

    /// Whether tags are being handled.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Verify `tag` if enabled.
    ///
    /// # Errors
    ///
    /// [`SessionError::ReaderDisabled`] while disabled, otherwise whatever
    /// [`Initiator::verify_tag`] returns.
    pub fn read(&self, tag: &dyn Tag) -> Result<VerificationResult, SessionError> {
        if !self.is_enabled() {
            return Err(SessionError::ReaderDisabled);
        }
        self.initiator.verify_tag(tag)
    }

    /// Platform callback for a discovered tag. Exactly one of the callbacks
    /// runs, unless reader mode is off, in which case the tag is ignored.
    /// Returns whether the tag was handled.
    pub fn on_tag_discovered(
        &self,
        tag: &dyn Tag,
        on_result: impl FnOnce(VerificationResult),
        on_error: impl FnOnce(SessionError),
    ) -> bool {
        match self.read(tag) {
            Ok(result) => on_result(result),
            Err(SessionError::ReaderDisabled) => {
                debug!("tag ignored, reader mode disabled");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "tap failed");
                on_error(e);
            }
        }
        true
    }
}
