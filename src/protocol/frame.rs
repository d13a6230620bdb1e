//! Frame struct with typed accessors.
//!
//! A [`Frame`] is one decoded unit of the wire protocol. It is constructed
//! transiently by the frame buffer on decode and never persisted; the
//! payload is shared zero-copy via `bytes::Bytes`.

use bytes::Bytes;

use super::wire_format::FrameType;

/// A complete decoded protocol frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded type tag.
    pub frame_type: FrameType,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from a type and payload.
    pub fn new(frame_type: FrameType, payload: Bytes) -> Self {
        Self {
            frame_type,
            payload,
        }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the payload length.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Check if this is a keepalive frame.
    #[inline]
    pub fn is_keepalive(&self) -> bool {
        self.frame_type == FrameType::KeepAlive
    }

    /// Check if this is a JSON/handshake frame.
    #[inline]
    pub fn is_json(&self) -> bool {
        self.frame_type == FrameType::Json
    }

    /// Check if this carries an individual parameter value (`PV` or `PS`).
    #[inline]
    pub fn is_parameter(&self) -> bool {
        matches!(
            self.frame_type,
            FrameType::ParamFloat | FrameType::ParamString
        )
    }

    /// Check if this carries a compressed bulk state block.
    #[inline]
    pub fn is_bulk(&self) -> bool {
        self.frame_type.is_bulk()
    }
}
