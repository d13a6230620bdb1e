//! Session handshake state machine.
//!
//! One [`Session`] models one live connection. The handshake drives it
//! forward:
//!
//! ```text
//! Initial --(send Hello)--> HelloSent --(send Subscribe)--> SubscribePending
//! SubscribePending --(acceptance JSON)--> Subscribed
//! SubscribePending --(rejection JSON)-->  Rejected      (terminal)
//! any              --(transport closed)-> Closed        (terminal)
//! ```
//!
//! `Subscribed` is the only phase in which outbound parameter writes are
//! permitted. A rejected or closed session is never revived; callers
//! create a new `Session` to retry.

use std::time::Instant;

use crate::codec::handshake::{HandshakeReply, HandshakeVerdict};
use crate::error::{Result, UcNetError};

use super::correlation::{CorrelationRegistry, CorrelationToken};

/// Phase of the session handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Connected, nothing sent yet.
    Initial,
    /// Hello frame written to the transport.
    HelloSent,
    /// Subscribe frame written; awaiting the peer's verdict.
    SubscribePending,
    /// Subscription accepted; parameter writes permitted.
    Subscribed,
    /// Subscription refused by the peer. Terminal.
    Rejected,
    /// Transport closed or failed. Terminal.
    Closed,
}

impl SessionPhase {
    /// Terminal phases require a fresh session to retry.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Rejected | SessionPhase::Closed)
    }
}

/// Outcome of feeding a handshake reply into the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Acceptance observed; the session token was adopted.
    Subscribed,
    /// Rejection observed; the session is terminally rejected.
    Rejected(String),
    /// Unrelated JSON traffic; no transition.
    Ignored,
}

/// One connection's negotiated state: phase, correlation registry and
/// activity timestamp. Owned by the engine and mutated only through the
/// transition methods below, always under the engine's session lock.
#[derive(Debug)]
pub struct Session {
    phase: SessionPhase,
    registry: CorrelationRegistry,
    last_activity: Instant,
    rejection: Option<String>,
}

impl Session {
    /// Create a session in `Initial` with the given registry.
    pub fn new(registry: CorrelationRegistry) -> Self {
        Self {
            phase: SessionPhase::Initial,
            registry,
            last_activity: Instant::now(),
            rejection: None,
        }
    }

    /// Current handshake phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Timestamp of the last frame sent or received, for external
    /// keepalive scheduling.
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Record frame activity in either direction.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// The token to use for the next outbound handshake frame.
    pub fn current_token(&self) -> CorrelationToken {
        self.registry.current_token()
    }

    /// Transition `Initial -> HelloSent`.
    pub fn mark_hello_sent(&mut self) -> Result<()> {
        self.transition(SessionPhase::Initial, SessionPhase::HelloSent)
    }

    /// Transition `HelloSent -> SubscribePending`.
    pub fn mark_subscribe_sent(&mut self) -> Result<()> {
        self.transition(SessionPhase::HelloSent, SessionPhase::SubscribePending)
    }

    /// Feed a decoded handshake reply into the machine.
    ///
    /// Acceptance adopts the peer-assigned token and enters `Subscribed`;
    /// rejection enters terminal `Rejected` without touching the token.
    /// Replies outside `SubscribePending` never mutate the token.
    pub fn observe_reply(&mut self, reply: &HandshakeReply) -> Result<ReplyOutcome> {
        if let HandshakeVerdict::Unrelated(id) = &reply.verdict {
            tracing::debug!(id = %id, "ignoring unrelated JSON frame");
            return Ok(ReplyOutcome::Ignored);
        }

        if self.phase != SessionPhase::SubscribePending {
            return Err(UcNetError::SessionNotReady(self.phase));
        }

        match &reply.verdict {
            HandshakeVerdict::Accepted => {
                self.registry.adopt(reply.token);
                self.phase = SessionPhase::Subscribed;
                Ok(ReplyOutcome::Subscribed)
            }
            HandshakeVerdict::Rejected(id) => {
                self.phase = SessionPhase::Rejected;
                self.rejection = Some(id.clone());
                Ok(ReplyOutcome::Rejected(id.clone()))
            }
            HandshakeVerdict::Unrelated(_) => unreachable!("handled above"),
        }
    }

    /// Read the `(phase, token)` pair for a parameter write.
    ///
    /// Must be called under the same lock as the handshake transitions so
    /// a write never pairs a `Subscribed` phase with a stale token.
    pub fn token_for_write(&self) -> Result<CorrelationToken> {
        match self.phase {
            SessionPhase::Subscribed => Ok(self.registry.current_token()),
            SessionPhase::Closed => Err(UcNetError::TransportClosed),
            other => Err(UcNetError::SessionNotReady(other)),
        }
    }

    /// The rejection id from the peer, once in `Rejected`.
    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection.as_deref()
    }

    /// Drive the session to terminal `Closed` (transport gone).
    pub fn close(&mut self) {
        self.phase = SessionPhase::Closed;
    }

    fn transition(&mut self, from: SessionPhase, to: SessionPhase) -> Result<()> {
        if self.phase != from {
            return Err(UcNetError::SessionNotReady(self.phase));
        }
        tracing::debug!(?from, ?to, "session transition");
        self.phase = to;
        Ok(())
    }
}
