//! Protocol module - wire format, framing, and frame types.
//!
//! Implements the framing layer of UCNet:
//! - magic + little-endian size field + 2-byte ASCII type tag
//! - frame buffer with resynchronization for streaming reads
//! - [`Frame`] struct with typed accessors

mod frame;
mod frame_buffer;
mod wire_format;

pub use frame::Frame;
pub use frame_buffer::FrameBuffer;
pub use wire_format::{
    build_frame, build_hello_frame, build_keepalive_frame, FrameType, DEFAULT_MAX_PAYLOAD_SIZE,
    HEADER_SIZE, HELLO_PAYLOAD, MAGIC,
};
