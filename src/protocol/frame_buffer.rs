//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management. Frames may
//! arrive split across multiple reads, several at once, or preceded by
//! non-protocol bytes (the receive loop may start mid-stream, and USB
//! captures interleave garbage). The buffer therefore resynchronizes:
//! whenever the head of the buffer is not the magic constant, everything
//! up to the next magic occurrence is discarded.
//!
//! Framing corruption is never fatal. A size field smaller than the type
//! tag or larger than the configured cap skips that magic and rescans,
//! so one corrupt header can never block the stream.

use bytes::{Buf, BytesMut};

use super::frame::Frame;
use super::wire_format::{FrameType, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE, MAGIC};

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    /// Accumulated bytes from transport reads.
    buffer: BytesMut,
    /// Maximum accepted payload size; larger size fields are corruption.
    max_payload_size: usize,
    /// Total bytes discarded during resynchronization.
    skipped: u64,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a frame buffer with a custom payload size cap.
    pub fn with_max_payload(max_payload_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            max_payload_size,
            skipped: 0,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// This is the main API for processing incoming transport data.
    /// Partial data is buffered internally for the next push; garbage is
    /// discarded with a warning.
    pub fn push(&mut self, data: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one() {
            frames.push(frame);
        }
        frames
    }

    /// Total bytes discarded by resynchronization so far.
    pub fn skipped_bytes(&self) -> u64 {
        self.skipped
    }

    /// Number of buffered bytes awaiting a complete frame.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Try to extract a single frame, resynchronizing as needed.
    ///
    /// Returns `None` when the buffer holds no complete frame (more data
    /// is needed).
    fn try_extract_one(&mut self) -> Option<Frame> {
        loop {
            self.resync();

            if self.buffer.len() < HEADER_SIZE {
                return None;
            }

            let size = u16::from_le_bytes([self.buffer[4], self.buffer[5]]) as usize;

            // The size field counts the 2-byte type tag; anything smaller
            // cannot be a real frame, and anything over the cap is treated
            // as corruption rather than waited on indefinitely.
            if size < 2 || size - 2 > self.max_payload_size {
                tracing::warn!(size, "implausible frame size, resynchronizing");
                self.buffer.advance(1);
                self.skipped += 1;
                continue;
            }

            let total = HEADER_SIZE + size - 2;
            if self.buffer.len() < total {
                return None;
            }

            let frame_type = FrameType::from_tag([self.buffer[6], self.buffer[7]]);
            let mut frame_bytes = self.buffer.split_to(total);
            frame_bytes.advance(HEADER_SIZE);
            return Some(Frame::new(frame_type, frame_bytes.freeze()));
        }
    }

    /// Discard bytes until the buffer starts with the magic constant.
    ///
    /// When no magic is present, the final bytes are retained only if they
    /// could be the start of a magic split across reads.
    fn resync(&mut self) {
        if self.buffer.starts_with(&MAGIC) {
            return;
        }

        let discard = match self.find_magic() {
            Some(pos) => pos,
            None => {
                // Keep the longest tail that is still a prefix of MAGIC.
                let keep = (1..MAGIC.len())
                    .rev()
                    .find(|&n| {
                        self.buffer.len() >= n && self.buffer[self.buffer.len() - n..] == MAGIC[..n]
                    })
                    .unwrap_or(0);
                self.buffer.len() - keep
            }
        };

        if discard > 0 {
            tracing::warn!(bytes = discard, "discarding non-protocol bytes");
            self.buffer.advance(discard);
            self.skipped += discard as u64;
        }
    }

    fn find_magic(&self) -> Option<usize> {
        self.buffer.windows(MAGIC.len()).position(|w| w == MAGIC)
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
