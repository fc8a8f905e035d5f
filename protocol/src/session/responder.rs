//! # Responder
//!
//! Holder side of a tap. The platform delivers command frames one at a time
//! and sends back whatever [`Responder::process_command`] returns.
//!
//! ```text
//!            SELECT (active ticket found)
//!   ┌──────┐ ──────────────────────────► ┌───────┐ ─┐ GET_TICKET_META
//!   │ Idle │                             │ Ready │  │ CHALLENGE (repeatable)
//!   └──────┘ ◄────────────────────────── └───────┘ ◄┘
//!       deactivation, or SELECT with no active ticket
//! ```
//!
//! Every SELECT starts a new [`TapSession`]; nothing carries over from the
//! previous one. Anything unexpected is answered with `6F 00` and never
//! panics.

use num_bigint::BigUint;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::SessionError;
use crate::config::CHALLENGE_LENGTH;
use crate::crypto::derivation::short_hex;
use crate::crypto::{reduce_challenge, sign, GroupParameters};
use crate::storage::TicketRepository;
use crate::ticket::Ticket;
use crate::wire::{decode_challenge, encode_signature, failure, success, Command, TicketMeta};

/// Why the link went away.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeactivationReason {
    /// The field dropped (devices moved apart).
    LinkLoss,
    /// The reader selected another application.
    Deselected,
}

/// Observable responder state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponderState {
    /// No session. Only SELECT is answered.
    Idle,
    /// A session is open for `ticket_id`.
    Ready {
        /// Ticket cached at SELECT time.
        ticket_id: String,
    },
}

/// One tap, from SELECT to deactivation.
#[derive(Debug)]
pub struct TapSession {
    id: Uuid,
    ticket: Ticket,
    challenges_answered: u32,
}

impl TapSession {
    fn new(ticket: Ticket) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticket,
            challenges_answered: 0,
        }
    }

    /// Session identifier, for log correlation.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Ticket cached for this session.
    pub fn ticket(&self) -> &Ticket {
        &self.ticket
    }

    /// Challenges signed so far.
    pub fn challenges_answered(&self) -> u32 {
        self.challenges_answered
    }
}

/// Holder-side state machine.
pub struct Responder<R: TicketRepository> {
    repository: R,
    params: GroupParameters,
    session: Option<TapSession>,
}

impl<R: TicketRepository> Responder<R> {
    /// Responder over the production group.
    pub fn new(repository: R) -> Self {
        Self::with_params(repository, GroupParameters::rfc3526().clone())
    }

    /// Responder over an explicit group.
    pub fn with_params(repository: R, params: GroupParameters) -> Self {
        Self {
            repository,
            params,
            session: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> ResponderState {
        match &self.session {
            None => ResponderState::Idle,
            Some(session) => ResponderState::Ready {
                ticket_id: session.ticket.ticket_id.clone(),
            },
        }
    }

    /// The open session, if any.
    pub fn session(&self) -> Option<&TapSession> {
        self.session.as_ref()
    }

    /// The underlying repository.
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Answer one command frame. Always returns a response frame.
    pub fn process_command(&mut self, apdu: &[u8]) -> Vec<u8> {
        let command = match Command::decode(apdu) {
            Ok(command) => command,
            Err(e) => {
                debug!(error = %e, len = apdu.len(), "rejecting malformed command");
                return failure();
            }
        };

        let result = match &command {
            Command::Select { .. } => self.select(&command),
            Command::GetTicketMeta => self.ticket_meta(),
            Command::Challenge(payload) => self.answer_challenge(payload),
        };

        result.unwrap_or_else(|e| {
            debug!(command = command.name(), error = %e, "command refused");
            failure()
        })
    }

    /// The link is gone. Drop the session.
    pub fn on_deactivated(&mut self, reason: DeactivationReason) {
        if let Some(session) = self.session.take() {
            debug!(
                session = %session.id,
                ?reason,
                challenges = session.challenges_answered,
                "tap session closed"
            );
        }
    }

    fn select(&mut self, command: &Command) -> Result<Vec<u8>, SessionError> {
        if !command.selects_us() {
            return Err(SessionError::ProtocolError(
                "SELECT for another application".to_string(),
            ));
        }

        // A new SELECT replaces the old session even if it then fails.
        self.session = None;
        let ticket = match self.repository.get_by_exclusive_flag() {
            Ok(Some(ticket)) => ticket,
            Ok(None) => {
                warn!("SELECT with no active ticket");
                return Err(SessionError::ProtocolError("no active ticket".to_string()));
            }
            Err(e) => {
                warn!(error = %e, "repository failed during SELECT");
                return Err(e.into());
            }
        };

        let session = TapSession::new(ticket);
        info!(
            session = %session.id,
            ticket_id = %session.ticket.ticket_id,
            "tap session opened"
        );
        self.session = Some(session);
        Ok(success())
    }

    fn ticket_meta(&self) -> Result<Vec<u8>, SessionError> {
        let session = self.require_session()?;
        let meta = TicketMeta {
            ticket_id: session.ticket.ticket_id.clone(),
            public_key: session.ticket.public_key.clone(),
        };
        Ok(meta.encode()?)
    }

    fn answer_challenge(
        &mut self,
        payload: &[u8; CHALLENGE_LENGTH],
    ) -> Result<Vec<u8>, SessionError> {
        let params = &self.params;
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| SessionError::ProtocolError("no session".to_string()))?;

        let challenge: BigUint = reduce_challenge(params, &decode_challenge(payload));
        let signature = sign(params, &session.ticket.acc, &challenge);
        session.challenges_answered += 1;
        debug!(
            session = %session.id,
            challenge = %short_hex(&challenge),
            "challenge signed"
        );
        Ok(encode_signature(&signature)?)
    }

    fn require_session(&self) -> Result<&TapSession, SessionError> {
        self.session
            .as_ref()
            .ok_or_else(|| SessionError::ProtocolError("no session".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{compute_public_key, verify_signature, SoftwareSigningCapability};
    use crate::storage::{MemoryRepository, StorageError, StorageResult};
    use crate::wire::{decode_signature, is_success};

    fn toy() -> GroupParameters {
        GroupParameters::new(23u32.into(), 4u32.into(), 11u32.into()).unwrap()
    }

    fn toy_ticket(id: &str, acc: u32) -> Ticket {
        let params = toy();
        let acc = BigUint::from(acc);
        let public_key = compute_public_key(&params, &acc);
        Ticket {
            ticket_id: id.to_string(),
            nonce: [0u8; 32],
            acc,
            public_keys: vec![public_key.clone()],
            public_key,
            timestamp: 1,
            added_to_wallet: true,
            nfc_enabled: false,
        }
    }

    fn responder_with(tickets: &[Ticket], active: Option<&str>) -> Responder<MemoryRepository> {
        let repo = MemoryRepository::new();
        for ticket in tickets {
            repo.save(ticket).unwrap();
        }
        if let Some(id) = active {
            repo.set_exclusive_flag(id, true).unwrap();
        }
        Responder::with_params(repo, toy())
    }

    fn challenge_apdu(c: u32) -> Vec<u8> {
        Command::challenge(&BigUint::from(c)).unwrap().encode()
    }

    #[test]
    fn idle_refuses_data_commands() {
        let mut responder = responder_with(&[toy_ticket("a", 7)], Some("a"));
        assert_eq!(
            responder.process_command(&Command::GetTicketMeta.encode()),
            failure()
        );
        assert_eq!(responder.process_command(&challenge_apdu(3)), failure());
        assert_eq!(responder.state(), ResponderState::Idle);
    }

    #[test]
    fn select_without_active_ticket_fails() {
        let mut responder = responder_with(&[toy_ticket("a", 7)], None);
        assert!(!is_success(&responder.process_command(&Command::select().encode())));
        assert_eq!(responder.state(), ResponderState::Idle);
    }

    #[test]
    fn full_exchange_verifies() {
        let params = toy();
        let mut responder = responder_with(&[toy_ticket("a", 7)], Some("a"));

        assert_eq!(responder.process_command(&Command::select().encode()), success());
        assert_eq!(
            responder.state(),
            ResponderState::Ready {
                ticket_id: "a".to_string()
            }
        );

        let meta = TicketMeta::decode(&responder.process_command(&Command::GetTicketMeta.encode()))
            .unwrap();
        assert_eq!(meta.ticket_id, "a");
        assert_eq!(meta.public_key, BigUint::from(8u32));

        // Repeated challenges in one session.
        for c in [3u32, 5, 10] {
            let sig = decode_signature(&responder.process_command(&challenge_apdu(c))).unwrap();
            assert!(verify_signature(&params, &meta.public_key, &BigUint::from(c), &sig));
        }
        assert_eq!(responder.session().unwrap().challenges_answered(), 3);
    }

    #[test]
    fn challenge_is_reduced_before_signing() {
        let params = toy();
        let mut responder = responder_with(&[toy_ticket("a", 7)], Some("a"));
        responder.process_command(&Command::select().encode());

        // 25 mod 11 = 3.
        let sig = decode_signature(&responder.process_command(&challenge_apdu(25))).unwrap();
        assert!(verify_signature(&params, &BigUint::from(8u32), &BigUint::from(3u32), &sig));
    }

    #[test]
    fn session_resets_between_taps() {
        let mut responder = responder_with(&[toy_ticket("a", 7), toy_ticket("b", 2)], Some("a"));

        responder.process_command(&Command::select().encode());
        let first = responder.session().unwrap().id();
        responder.on_deactivated(DeactivationReason::LinkLoss);
        assert_eq!(responder.state(), ResponderState::Idle);
        assert!(!is_success(&responder.process_command(&challenge_apdu(3))));

        // The holder switches tickets between taps.
        responder.repository().set_exclusive_flag("b", true).unwrap();
        responder.process_command(&Command::select().encode());
        let session = responder.session().unwrap();
        assert_ne!(session.id(), first);
        assert_eq!(session.ticket().ticket_id, "b");
        assert_eq!(session.challenges_answered(), 0);
    }

    #[test]
    fn reselect_replaces_session() {
        let mut responder = responder_with(&[toy_ticket("a", 7)], Some("a"));
        responder.process_command(&Command::select().encode());
        let first = responder.session().unwrap().id();
        responder.process_command(&Command::select().encode());
        assert_ne!(responder.session().unwrap().id(), first);
    }

    #[test]
    fn reselect_switches_to_newly_active_ticket() {
        let mut responder = responder_with(&[toy_ticket("a", 7), toy_ticket("b", 2)], Some("a"));
        assert_eq!(responder.process_command(&Command::select().encode()), success());

        // No link loss in between: the reader simply selects again.
        responder.repository().set_exclusive_flag("b", true).unwrap();
        assert_eq!(responder.process_command(&Command::select().encode()), success());
        assert_eq!(
            responder.state(),
            ResponderState::Ready {
                ticket_id: "b".to_string()
            }
        );

        let meta = TicketMeta::decode(&responder.process_command(&Command::GetTicketMeta.encode()))
            .unwrap();
        assert_eq!(meta.ticket_id, "b");
        assert_eq!(meta.public_key, BigUint::from(16u32));
    }

    #[test]
    fn failed_reselect_drops_session() {
        let mut responder = responder_with(&[toy_ticket("a", 7)], Some("a"));
        responder.process_command(&Command::select().encode());
        responder.repository().set_exclusive_flag("a", false).unwrap();
        assert!(!is_success(&responder.process_command(&Command::select().encode())));
        assert_eq!(responder.state(), ResponderState::Idle);
    }

    #[test]
    fn foreign_select_leaves_state_alone() {
        let mut responder = responder_with(&[toy_ticket("a", 7)], Some("a"));
        responder.process_command(&Command::select().encode());
        let foreign = Command::Select {
            aid: vec![0xA0, 0x00, 0x00, 0x00, 0x03],
        };
        assert!(!is_success(&responder.process_command(&foreign.encode())));
        assert!(matches!(responder.state(), ResponderState::Ready { .. }));
    }

    #[test]
    fn malformed_frames_fail_without_state_change() {
        let mut responder = responder_with(&[toy_ticket("a", 7)], Some("a"));
        responder.process_command(&Command::select().encode());
        let frames: [&[u8]; 4] = [
            &[],
            &[0x00],
            &[0x00, 0xA2, 0x00, 0x00, 0x20, 0x01],
            &[0x00, 0xFF, 0x00, 0x00],
        ];
        for frame in frames {
            assert_eq!(responder.process_command(frame), failure());
        }
        assert!(matches!(responder.state(), ResponderState::Ready { .. }));
    }

    struct FailingRepository;

    impl TicketRepository for FailingRepository {
        fn get_all(&self) -> StorageResult<Vec<Ticket>> {
            Err(StorageError::Serialization("boom".to_string()))
        }
        fn get(&self, _: &str) -> StorageResult<Option<Ticket>> {
            Err(StorageError::Serialization("boom".to_string()))
        }
        fn save(&self, _: &Ticket) -> StorageResult<()> {
            Err(StorageError::Serialization("boom".to_string()))
        }
        fn update(
            &self,
            _: &str,
            _: &dyn Fn(&mut Ticket) -> bool,
        ) -> StorageResult<Option<Ticket>> {
            Err(StorageError::Serialization("boom".to_string()))
        }
        fn delete(&self, _: &str) -> StorageResult<()> {
            Err(StorageError::Serialization("boom".to_string()))
        }
        fn set_exclusive_flag(&self, _: &str, _: bool) -> StorageResult<()> {
            Err(StorageError::Serialization("boom".to_string()))
        }
        fn get_by_exclusive_flag(&self) -> StorageResult<Option<Ticket>> {
            Err(StorageError::Serialization("boom".to_string()))
        }
    }

    #[test]
    fn repository_failure_on_select_stays_idle() {
        let mut responder = Responder::with_params(FailingRepository, toy());
        assert!(!is_success(&responder.process_command(&Command::select().encode())));
        assert_eq!(responder.state(), ResponderState::Idle);
    }

    #[test]
    fn production_group_responder() {
        let device = SoftwareSigningCapability::generate();
        let repo = MemoryRepository::new();
        let ticket = Ticket::generate(&device, GroupParameters::rfc3526()).unwrap();
        repo.save(&ticket).unwrap();
        repo.set_exclusive_flag(&ticket.ticket_id, true).unwrap();

        let mut responder = Responder::new(repo);
        assert!(is_success(&responder.process_command(&Command::select().encode())));
        let meta = TicketMeta::decode(&responder.process_command(&Command::GetTicketMeta.encode()))
            .unwrap();
        assert_eq!(meta.public_key, ticket.public_key);
    }
}
