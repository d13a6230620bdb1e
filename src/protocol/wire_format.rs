//! Wire format encoding and decoding.
//!
//! Every UCNet frame on the wire looks like:
//! ```text
//! ┌──────────┬──────────┬──────────┬─────────────┐
//! │ Magic    │ Size     │ Type tag │ Payload     │
//! │ 4 bytes  │ 2 bytes  │ 2 bytes  │ size-2 bytes│
//! │ UC\0\x01 │ u16 LE   │ ASCII    │             │
//! └──────────┴──────────┴──────────┴─────────────┘
//! ```
//!
//! The size field counts the 2-byte type tag, so a frame occupies
//! `6 + size` bytes total and carries `size - 2` payload bytes.

/// Magic bytes that start every frame (`UC\0\x01`).
pub const MAGIC: [u8; 4] = [0x55, 0x43, 0x00, 0x01];

/// Header size in bytes: magic + size field + type tag.
pub const HEADER_SIZE: usize = 8;

/// Default maximum payload size accepted by the frame buffer.
///
/// The size field is a u16 counting the type tag, so a payload can never
/// legitimately exceed this. Anything larger is treated as corruption.
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = u16::MAX as usize - 2;

/// Fixed Hello payload, sent as the first frame of every session.
pub const HELLO_PAYLOAD: [u8; 6] = [0x00, 0x00, 0x65, 0x00, 0x15, 0xFA];

/// Frame type tags (2 ASCII bytes each).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// `UM` - Hello/handshake opener.
    Hello,
    /// `JM` - JSON message (Subscribe request and reply).
    Json,
    /// `PV` - float parameter value.
    ParamFloat,
    /// `PS` - string parameter value.
    ParamString,
    /// `PL` - parameter list.
    ParamList,
    /// `KA` - keepalive.
    KeepAlive,
    /// `ZB` - zlib-compressed bulk state block.
    BulkZb,
    /// `ZM` - zlib-compressed bulk state block (length-prefixed variant).
    BulkZm,
    /// `MS` - meter status.
    MeterStatus,
    /// Any tag the engine does not interpret.
    Unknown([u8; 2]),
}

impl FrameType {
    /// The 2-byte wire tag for this frame type.
    pub fn tag(&self) -> [u8; 2] {
        match self {
            FrameType::Hello => *b"UM",
            FrameType::Json => *b"JM",
            FrameType::ParamFloat => *b"PV",
            FrameType::ParamString => *b"PS",
            FrameType::ParamList => *b"PL",
            FrameType::KeepAlive => *b"KA",
            FrameType::BulkZb => *b"ZB",
            FrameType::BulkZm => *b"ZM",
            FrameType::MeterStatus => *b"MS",
            FrameType::Unknown(tag) => *tag,
        }
    }

    /// Parse a frame type from its 2-byte wire tag.
    pub fn from_tag(tag: [u8; 2]) -> Self {
        match &tag {
            b"UM" => FrameType::Hello,
            b"JM" => FrameType::Json,
            b"PV" => FrameType::ParamFloat,
            b"PS" => FrameType::ParamString,
            b"PL" => FrameType::ParamList,
            b"KA" => FrameType::KeepAlive,
            b"ZB" => FrameType::BulkZb,
            b"ZM" => FrameType::BulkZm,
            b"MS" => FrameType::MeterStatus,
            _ => FrameType::Unknown(tag),
        }
    }

    /// Whether this tag carries a compressed bulk state block.
    #[inline]
    pub fn is_bulk(&self) -> bool {
        matches!(self, FrameType::BulkZb | FrameType::BulkZm)
    }
}

/// Build a complete frame as a single byte vector.
///
/// Prepends the magic, writes the little-endian size field as
/// `2 + payload.len()`, then appends the tag and payload. Payload content
/// is not validated.
///
/// # Example
///
/// ```
/// use ucnet_client::protocol::{build_frame, FrameType, HEADER_SIZE, MAGIC};
///
/// let bytes = build_frame(FrameType::KeepAlive, &[]);
/// assert!(bytes.starts_with(&MAGIC));
/// assert_eq!(bytes.len(), HEADER_SIZE);
/// ```
pub fn build_frame(frame_type: FrameType, payload: &[u8]) -> Vec<u8> {
    debug_assert!(payload.len() <= DEFAULT_MAX_PAYLOAD_SIZE);
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&MAGIC);
    buf.extend_from_slice(&((payload.len() as u16 + 2).to_le_bytes()));
    buf.extend_from_slice(&frame_type.tag());
    buf.extend_from_slice(payload);
    buf
}

/// Build the fixed Hello frame (`UM`), the first frame of every session.
pub fn build_hello_frame() -> Vec<u8> {
    build_frame(FrameType::Hello, &HELLO_PAYLOAD)
}

/// Build an empty keepalive frame (`KA`).
pub fn build_keepalive_frame() -> Vec<u8> {
    build_frame(FrameType::KeepAlive, &[])
}
