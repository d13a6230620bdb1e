//! Error types for ucnet-client.

use thiserror::Error;

use crate::session::SessionPhase;

/// Main error type for all UCNet engine operations.
///
/// Only [`UcNetError::TransportClosed`], [`UcNetError::Io`] and
/// [`UcNetError::HandshakeRejected`] are fatal for a session. Framing,
/// parameter and decompression errors are recovered locally by skipping
/// the offending frame or block.
#[derive(Debug, Error)]
pub enum UcNetError {
    /// I/O error on the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while building or parsing a handshake payload.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Corrupt frame header (bad magic, implausible size). Triggers
    /// resynchronization in the frame buffer; never surfaced to callers.
    #[error("framing error: {0}")]
    Framing(String),

    /// Parameter payload missing its NUL terminator or too short for its
    /// kind. The frame is dropped and the receive loop continues.
    #[error("malformed parameter payload: {0}")]
    MalformedParameter(String),

    /// Bulk block whose zlib signature could not be located or whose
    /// stream is corrupt. The block is dropped.
    #[error("bulk decompression failed: {0}")]
    Decompression(String),

    /// A write was attempted outside the `Subscribed` phase.
    #[error("session not ready for writes (phase: {0:?})")]
    SessionNotReady(SessionPhase),

    /// The peer rejected our subscription. Terminal for this session.
    #[error("handshake rejected by peer: {0}")]
    HandshakeRejected(String),

    /// The transport was closed; pending and future operations fail fast.
    #[error("transport closed")]
    TransportClosed,
}

/// Result type alias using UcNetError.
pub type Result<T> = std::result::Result<T, UcNetError>;
