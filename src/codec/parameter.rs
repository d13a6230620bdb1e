//! Parameter payload encoding and decoding.
//!
//! Individual parameter frames (`PV` float, `PS` string) share a layout:
//!
//! ```text
//! correlationToken(4) | path + NUL | pad(2) | value
//! ```
//!
//! The 2 padding bytes are a fixed structural gap in the protocol and are
//! always emitted on encode. On decode, the float value is taken from the
//! trailing 4 bytes of the payload rather than a fixed forward offset:
//! filter-group variants widen the gap between path and value, but the
//! value always sits at the end.

use crate::error::{Result, UcNetError};
use crate::session::CorrelationToken;

/// The decoded value of a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// IEEE-754 single precision, typically normalized 0.0-1.0.
    Float(f32),
    /// UTF-8 string value.
    Text(String),
}

/// One parameter change, either decoded from the wire or extracted from a
/// bulk state block.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterUpdate {
    /// Hierarchical `/`-separated path, e.g. `main/ch1/volume`.
    pub path: String,
    /// Latest value for the path.
    pub value: ParamValue,
    /// True for values extracted heuristically from a bulk block; such
    /// values stand until reconfirmed by an individual parameter frame.
    pub provisional: bool,
}

impl ParameterUpdate {
    /// A confirmed update decoded from an individual parameter frame.
    pub fn confirmed(path: String, value: ParamValue) -> Self {
        Self {
            path,
            value,
            provisional: false,
        }
    }

    /// A provisional update extracted from a bulk state block.
    pub fn provisional(path: String, value: ParamValue) -> Self {
        Self {
            path,
            value,
            provisional: true,
        }
    }
}

/// Encode a float parameter set payload (`PV`).
pub fn encode_float_set(path: &str, value: f32, token: CorrelationToken) -> Vec<u8> {
    let mut payload = Vec::with_capacity(4 + path.len() + 3 + 4);
    payload.extend_from_slice(&token);
    payload.extend_from_slice(path.as_bytes());
    payload.push(0x00);
    payload.extend_from_slice(&[0x00, 0x00]);
    payload.extend_from_slice(&value.to_le_bytes());
    payload
}

/// Encode a boolean parameter set payload.
///
/// Toggles (mute, solo) are carried as 0.0/1.0 floats on the wire.
pub fn encode_bool_set(path: &str, value: bool, token: CorrelationToken) -> Vec<u8> {
    encode_float_set(path, if value { 1.0 } else { 0.0 }, token)
}

/// Encode a string parameter set payload (`PS`).
pub fn encode_string_set(path: &str, value: &str, token: CorrelationToken) -> Vec<u8> {
    let mut payload = Vec::with_capacity(4 + path.len() + 3 + value.len() + 1);
    payload.extend_from_slice(&token);
    payload.extend_from_slice(path.as_bytes());
    payload.push(0x00);
    payload.extend_from_slice(&[0x00, 0x00]);
    payload.extend_from_slice(value.as_bytes());
    payload.push(0x00);
    payload
}

/// Decode a float parameter payload into `(path, value)`.
///
/// The correlation token occupies the first 4 bytes and is skipped; the
/// value is decoded from the trailing 4 bytes regardless of the padding
/// width between path and value.
pub fn decode_float_value(payload: &[u8]) -> Result<(String, f32)> {
    let (path, nul_idx) = decode_path(payload)?;

    // Path NUL, then at least the value itself.
    if payload.len() < nul_idx + 1 + 4 {
        return Err(UcNetError::MalformedParameter(format!(
            "float payload too short for value ({} bytes)",
            payload.len()
        )));
    }

    let tail: [u8; 4] = payload[payload.len() - 4..].try_into().expect("4-byte tail");
    Ok((path, f32::from_le_bytes(tail)))
}

/// Decode a string parameter payload into `(path, value)`.
///
/// The value begins 3 bytes after the path's terminating NUL (skipping the
/// NUL and 2 padding bytes) and runs to the next NUL or the payload end.
pub fn decode_string_value(payload: &[u8]) -> Result<(String, String)> {
    let (path, nul_idx) = decode_path(payload)?;

    let val_start = nul_idx + 3;
    if val_start > payload.len() {
        return Err(UcNetError::MalformedParameter(format!(
            "string payload too short for value ({} bytes)",
            payload.len()
        )));
    }

    let rest = &payload[val_start..];
    let val_end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
    let value = String::from_utf8_lossy(&rest[..val_end]).into_owned();
    Ok((path, value))
}

/// Extract the NUL-terminated path after the 4-byte token.
///
/// Returns the path and the absolute index of its NUL terminator.
fn decode_path(payload: &[u8]) -> Result<(String, usize)> {
    if payload.len() < 6 {
        return Err(UcNetError::MalformedParameter(format!(
            "parameter payload too short ({} bytes)",
            payload.len()
        )));
    }

    let data = &payload[4..];
    let rel_nul = data
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| UcNetError::MalformedParameter("no path terminator".to_string()))?;

    if rel_nul == 0 {
        return Err(UcNetError::MalformedParameter("empty path".to_string()));
    }

    let path = std::str::from_utf8(&data[..rel_nul])
        .map_err(|_| UcNetError::MalformedParameter("path is not valid UTF-8".to_string()))?
        .to_string();

    Ok((path, 4 + rel_nul))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: CorrelationToken = [0x72, 0x00, 0x65, 0x00];

    #[test]
    fn test_float_roundtrip() {
        let payload = encode_float_set("main/ch1/volume", 0.5, TOKEN);
        let (path, value) = decode_float_value(&payload).unwrap();
        assert_eq!(path, "main/ch1/volume");
        assert!((value - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_float_layout() {
        let payload = encode_float_set("a/b", 0.25, TOKEN);
        assert_eq!(&payload[..4], &TOKEN);
        assert_eq!(&payload[4..7], b"a/b");
        assert_eq!(payload[7], 0x00);
        assert_eq!(&payload[8..10], &[0x00, 0x00]);
        assert_eq!(&payload[10..], &0.25f32.to_le_bytes());
    }

    #[test]
    fn test_string_roundtrip() {
        let payload = encode_string_set("main/ch3/username", "Lead Vox", TOKEN);
        let (path, value) = decode_string_value(&payload).unwrap();
        assert_eq!(path, "main/ch3/username");
        assert_eq!(value, "Lead Vox");
    }

    #[test]
    fn test_string_without_trailing_nul() {
        // Peers may omit the trailing NUL; the value runs to payload end.
        let mut payload = encode_string_set("main/ch1/username", "Kick", TOKEN);
        payload.pop();
        let (_, value) = decode_string_value(&payload).unwrap();
        assert_eq!(value, "Kick");
    }

    #[test]
    fn test_bool_encodes_as_float() {
        let payload = encode_bool_set("main/ch1/mute", true, TOKEN);
        let (path, value) = decode_float_value(&payload).unwrap();
        assert_eq!(path, "main/ch1/mute");
        assert_eq!(value, 1.0);
    }

    #[test]
    fn test_float_value_read_from_tail() {
        // Filter-group variants widen the gap after the path; the value
        // must still decode from the trailing 4 bytes.
        let mut payload = Vec::new();
        payload.extend_from_slice(&TOKEN);
        payload.extend_from_slice(b"line/ch2/filter");
        payload.push(0x00);
        payload.extend_from_slice(&[0x00, 0x01, 0x00, 0x00]); // wider gap
        payload.extend_from_slice(&0.75f32.to_le_bytes());

        let (path, value) = decode_float_value(&payload).unwrap();
        assert_eq!(path, "line/ch2/filter");
        assert!((value - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_missing_terminator_rejected() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&TOKEN);
        payload.extend_from_slice(b"main/ch1/volume"); // no NUL
        let err = decode_float_value(&payload).unwrap_err();
        assert!(matches!(err, UcNetError::MalformedParameter(_)));
    }

    #[test]
    fn test_short_payload_rejected() {
        assert!(matches!(
            decode_float_value(&[0x72, 0x00, 0x65]),
            Err(UcNetError::MalformedParameter(_))
        ));
        assert!(matches!(
            decode_string_value(&[]),
            Err(UcNetError::MalformedParameter(_))
        ));
    }

    #[test]
    fn test_truncated_float_value_rejected() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&TOKEN);
        payload.extend_from_slice(b"main/ch1/pan\x00\x00");
        let err = decode_float_value(&payload).unwrap_err();
        assert!(matches!(err, UcNetError::MalformedParameter(_)));
    }

    #[test]
    fn test_update_constructors() {
        let confirmed =
            ParameterUpdate::confirmed("main/ch1/pan".into(), ParamValue::Float(0.5));
        assert!(!confirmed.provisional);

        let provisional =
            ParameterUpdate::provisional("main/ch1/pan".into(), ParamValue::Float(0.5));
        assert!(provisional.provisional);
    }
}
