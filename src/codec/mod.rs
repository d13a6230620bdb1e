//! Codec module - payload encoding/decoding for frame bodies.
//!
//! Three codecs sit above the framing layer:
//!
//! - [`parameter`] - float/string parameter payloads (`PV`/`PS`)
//! - [`handshake`] - Hello constant and the Subscribe JSON exchange (`JM`)
//! - [`bulk`] - zlib-compressed bulk state blocks (`ZB`/`ZM`)
//!
//! All are stateless; the bulk decoder only owns scratch buffers for the
//! duration of one block.

pub mod bulk;
pub mod handshake;
pub mod parameter;

pub use bulk::{BulkStateDecoder, BulkUpdates};
pub use handshake::{ClientDescriptor, HandshakeReply, HandshakeVerdict};
pub use parameter::{ParamValue, ParameterUpdate};
