//! Bulk state block decoding.
//!
//! After a subscription is accepted, the console dumps most of its state
//! in zlib-compressed `ZB`/`ZM` frames. The payload carries a short header
//! (a correlation-token-like prefix and, in the `ZM` variant, a declared
//! uncompressed length) followed by the compressed stream. The stream does
//! not start at a fixed offset in every variant, so the decoder locates it
//! by scanning for the zlib signature.
//!
//! The decompressed buffer is not self-describing. Parameter paths are
//! recovered by scanning for printable runs matching the path grammar, and
//! values by best-effort positional proximity: the nearest plausible
//! little-endian f32 after each path. Everything extracted this way is
//! flagged provisional and stands only until an individual `PV` frame
//! reconfirms it.

use std::io::Read;

use flate2::read::ZlibDecoder;

use super::parameter::{ParamValue, ParameterUpdate};
use crate::error::{Result, UcNetError};

/// How far into the payload header to look for the zlib signature.
const SIGNATURE_SCAN_WINDOW: usize = 16;

/// Accepted second bytes of a zlib stream header (first byte 0x78).
const ZLIB_SECOND_BYTES: [u8; 4] = [0x01, 0x5E, 0x9C, 0xDA];

/// Hard cap on decompressed output when the header declares no length.
const DEFAULT_MAX_DECOMPRESSED: u64 = 16 * 1024 * 1024;

/// How many bytes past a path's end to search for its value.
const VALUE_WINDOW: usize = 8;

/// Decoder for compressed bulk state blocks.
///
/// Stateless; each call decompresses one block and returns a lazy
/// iterator over the updates found in it.
pub struct BulkStateDecoder;

impl BulkStateDecoder {
    /// Decompress a bulk payload and return its parameter updates.
    ///
    /// Fails with [`UcNetError::Decompression`] when no zlib signature is
    /// found or the stream is corrupt; the caller drops the block and the
    /// stream continues.
    pub fn decode(payload: &[u8]) -> Result<BulkUpdates> {
        if payload.len() < 6 {
            return Err(UcNetError::Decompression(format!(
                "bulk payload too short ({} bytes)",
                payload.len()
            )));
        }

        // The ZM variant declares the uncompressed length after the token;
        // when present it bounds the output, otherwise a fixed cap does.
        let declared = if payload.len() >= 8 {
            u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]) as u64
        } else {
            0
        };
        let limit = if declared > 0 && declared <= DEFAULT_MAX_DECOMPRESSED {
            declared
        } else {
            DEFAULT_MAX_DECOMPRESSED
        };

        let window = payload.len().min(SIGNATURE_SCAN_WINDOW);
        for offset in 4..window.saturating_sub(1) {
            if payload[offset] != 0x78 || !ZLIB_SECOND_BYTES.contains(&payload[offset + 1]) {
                continue;
            }

            let mut out = Vec::new();
            let decoder = ZlibDecoder::new(&payload[offset..]);
            match decoder.take(limit).read_to_end(&mut out) {
                Ok(_) => {
                    tracing::debug!(
                        compressed = payload.len() - offset,
                        decompressed = out.len(),
                        offset,
                        "decoded bulk state block"
                    );
                    return Ok(BulkUpdates { buf: out, pos: 0 });
                }
                // A false-positive signature match; keep scanning.
                Err(err) => {
                    tracing::debug!(offset, %err, "zlib candidate failed, scanning on");
                }
            }
        }

        Err(UcNetError::Decompression(
            "no valid zlib stream in bulk payload".to_string(),
        ))
    }
}

/// Lazy, finite, non-restartable sequence of updates from one bulk block.
///
/// Yields provisional [`ParameterUpdate`]s as the decompressed buffer is
/// scanned. Unparseable trailing bytes end the sequence silently.
pub struct BulkUpdates {
    buf: Vec<u8>,
    pos: usize,
}

impl Iterator for BulkUpdates {
    type Item = ParameterUpdate;

    fn next(&mut self) -> Option<ParameterUpdate> {
        while self.pos < self.buf.len() {
            let Some((start, end)) = next_charset_run(&self.buf, self.pos) else {
                self.pos = self.buf.len();
                return None;
            };
            self.pos = end;

            let run = &self.buf[start..end];
            if !is_path(run) {
                continue;
            }

            // Safe: is_path only accepts ASCII.
            let path = std::str::from_utf8(run).ok()?.to_string();
            let value = nearby_float(&self.buf, end).unwrap_or(0.0);
            return Some(ParameterUpdate::provisional(path, ParamValue::Float(value)));
        }
        None
    }
}

/// Find the next maximal run of path-charset bytes at or after `from`.
fn next_charset_run(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    let start = buf[from..].iter().position(|&b| in_charset(b))? + from;
    let end = buf[start..]
        .iter()
        .position(|&b| !in_charset(b))
        .map(|n| start + n)
        .unwrap_or(buf.len());
    Some((start, end))
}

#[inline]
fn in_charset(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'/' || b == b'_'
}

/// Path grammar: two or more `/`-separated ASCII segments, each starting
/// with a letter and continuing with letters, digits or underscores.
fn is_path(run: &[u8]) -> bool {
    let mut segments = 0;
    for segment in run.split(|&b| b == b'/') {
        match segment.first() {
            Some(b) if b.is_ascii_alphabetic() => {}
            _ => return false,
        }
        segments += 1;
    }
    segments >= 2
}

/// Look for a plausible little-endian f32 shortly after a path.
///
/// Heuristic positional correlation: the path's NUL terminator is skipped,
/// then the first finite value of sane magnitude within the window wins.
/// Returns `None` at buffer end.
fn nearby_float(buf: &[u8], from: usize) -> Option<f32> {
    let from = if buf.get(from) == Some(&0) { from + 1 } else { from };
    for offset in 0..=VALUE_WINDOW {
        let at = from + offset;
        if at + 4 > buf.len() {
            return None;
        }
        let candidate = f32::from_le_bytes(buf[at..at + 4].try_into().expect("4 bytes"));
        if candidate.is_finite() && (-4096.0..=4096.0).contains(&candidate) {
            return Some(candidate);
        }
    }
    None
}
