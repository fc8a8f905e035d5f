//! # Contactless Transport
//!
//! The verifier never talks to a radio directly. A platform adapter hands it
//! a [`Tag`], the tag may offer a [`Transport`], and the transport moves raw
//! APDU frames. [`LoopbackTransport`] plugs an in-process [`Responder`] into
//! the same seam.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::error::SessionError;
use super::responder::{DeactivationReason, Responder};
use crate::config::TRANSCEIVE_TIMEOUT;
use crate::storage::TicketRepository;

/// A connection to a discovered tag.
pub trait Transport: Send {
    /// Open the link.
    fn connect(&mut self) -> Result<(), SessionError>;

    /// Bound every subsequent [`transceive`](Transport::transceive).
    fn set_timeout(&mut self, timeout: Duration);

    /// Send one command frame and wait for its response frame.
    fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>, SessionError>;

    /// Close the link. Must be safe to call more than once.
    fn close(&mut self);

    /// Whether the link is open.
    fn is_connected(&self) -> bool;
}

/// A discovered tag.
pub trait Tag {
    /// Tag identifier, for logs.
    fn id(&self) -> Vec<u8> {
        Vec::new()
    }

    /// The tag's transport, or `None` if it does not speak ISO-DEP.
    fn transport(&self) -> Option<Box<dyn Transport>>;
}

// ---------------------------------------------------------------------------
// ConnectionGuard
// ---------------------------------------------------------------------------

/// Owns a transport for the length of one exchange and closes it on drop,
/// whatever path the exchange leaves by.
pub struct ConnectionGuard {
    transport: Box<dyn Transport>,
}

impl ConnectionGuard {
    /// Take ownership of `transport`.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Connect and apply `timeout`.
    pub fn open(&mut self, timeout: Duration) -> Result<(), SessionError> {
        self.transport.connect()?;
        self.transport.set_timeout(timeout);
        Ok(())
    }

    /// Exchange one frame.
    pub fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>, SessionError> {
        trace!(len = command.len(), "-> frame");
        let response = self.transport.transceive(command)?;
        trace!(len = response.len(), "<- frame");
        Ok(response)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.transport.close();
        debug!("transport closed");
    }
}

// ---------------------------------------------------------------------------
// Loopback
// ---------------------------------------------------------------------------

/// A responder shared between the holder and any loopback links to it.
pub type SharedResponder<R> = Arc<Mutex<Responder<R>>>;

/// In-process transport straight into a [`Responder`].
///
/// Closing the link deactivates the responder, as a real field drop does.
pub struct LoopbackTransport<R: TicketRepository> {
    responder: SharedResponder<R>,
    connected: bool,
    timeout: Duration,
}

impl<R: TicketRepository> LoopbackTransport<R> {
    /// Link to `responder`. Not yet connected.
    pub fn new(responder: SharedResponder<R>) -> Self {
        Self {
            responder,
            connected: false,
            timeout: TRANSCEIVE_TIMEOUT,
        }
    }

    /// The timeout last applied.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl<R: TicketRepository> Transport for LoopbackTransport<R> {
    fn connect(&mut self) -> Result<(), SessionError> {
        self.connected = true;
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>, SessionError> {
        if !self.connected {
            return Err(SessionError::Transport("link not connected".to_string()));
        }
        let mut responder = self
            .responder
            .try_lock_for(self.timeout)
            .ok_or(SessionError::Timeout)?;
        Ok(responder.process_command(command))
    }

    fn close(&mut self) {
        if self.connected {
            self.connected = false;
            self.responder
                .lock()
                .on_deactivated(DeactivationReason::LinkLoss);
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// A tag backed by an in-process responder.
pub struct LoopbackTag<R: TicketRepository> {
    responder: SharedResponder<R>,
}

impl<R: TicketRepository> LoopbackTag<R> {
    /// Tag in front of `responder`.
    pub fn new(responder: SharedResponder<R>) -> Self {
        Self { responder }
    }
}

impl<R: TicketRepository + 'static> Tag for LoopbackTag<R> {
    fn id(&self) -> Vec<u8> {
        b"loopback".to_vec()
    }

    fn transport(&self) -> Option<Box<dyn Transport>> {
        Some(Box::new(LoopbackTransport::new(Arc::clone(&self.responder))))
    }
}
