//! Session state: correlation tokens and the handshake state machine.

pub mod correlation;
pub mod machine;

pub use correlation::{CorrelationRegistry, CorrelationToken, DEFAULT_CLIENT_TOKEN};
pub use machine::{ReplyOutcome, Session, SessionPhase};
