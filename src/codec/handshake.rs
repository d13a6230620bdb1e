//! Handshake payload encoding and decoding.
//!
//! The handshake is two frames: the fixed `UM` Hello, then a `JM` frame
//! carrying a JSON client descriptor:
//!
//! ```text
//! correlationToken(4) | jsonLength:u32-LE(4) | jsonBytes
//! ```
//!
//! The peer answers with another `JM` frame in the same layout. Its first
//! 4 payload bytes are the session correlation token the client must echo
//! on every subsequent parameter write.

use serde::{Deserialize, Serialize};

use crate::error::{Result, UcNetError};
use crate::session::CorrelationToken;

/// Client descriptor sent in the Subscribe request.
///
/// The capability option flags are a space-separated token set; any subset
/// may be advertised, and absent tokens simply disable those notification
/// classes on the peer side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDescriptor {
    pub id: String,
    pub client_name: String,
    pub client_internal_name: String,
    pub client_type: String,
    pub client_description: String,
    pub client_identifier: String,
    pub client_options: String,
    pub client_encoding: u32,
}

impl Default for ClientDescriptor {
    fn default() -> Self {
        Self {
            id: "Subscribe".to_string(),
            // Consoles only accept writes from clients that present the
            // same descriptor shape Universal Control sends.
            client_name: "Universal Control".to_string(),
            client_internal_name: "ucapp".to_string(),
            client_type: "Mac".to_string(),
            client_description: "ucnet-client".to_string(),
            client_identifier: "ucnet-client".to_string(),
            // perm=permissions, users=user list, levl=levels,
            // redu=redux, rtan=real-time analysis
            client_options: "perm users levl redu rtan".to_string(),
            client_encoding: 23106,
        }
    }
}

/// Verdict carried by a handshake reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeVerdict {
    /// `SubscriptionReply`: the peer accepted the subscription.
    Accepted,
    /// Any other `Subscription*` id: the peer refused the subscription.
    Rejected(String),
    /// JSON traffic unrelated to the subscription handshake.
    Unrelated(String),
}

/// A decoded `JM` handshake reply.
#[derive(Debug, Clone)]
pub struct HandshakeReply {
    /// The 4 bytes immediately after the type tag: the peer-assigned
    /// session correlation token.
    pub token: CorrelationToken,
    /// What the JSON body said.
    pub verdict: HandshakeVerdict,
}

#[derive(Deserialize)]
struct ReplyBody {
    #[serde(default)]
    id: String,
}

/// Encode a Subscribe request payload for a `JM` frame.
pub fn encode_subscribe(descriptor: &ClientDescriptor, token: CorrelationToken) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(descriptor)?;

    let mut payload = Vec::with_capacity(8 + json.len());
    payload.extend_from_slice(&token);
    payload.extend_from_slice(&(json.len() as u32).to_le_bytes());
    payload.extend_from_slice(&json);
    Ok(payload)
}

/// Decode a `JM` reply payload.
///
/// Truncation or invalid JSON is malformed (the frame is dropped and the
/// session keeps waiting); the subscription verdict is read from the JSON
/// body's `id` field.
pub fn decode_reply(payload: &[u8]) -> Result<HandshakeReply> {
    if payload.len() < 8 {
        return Err(UcNetError::MalformedParameter(format!(
            "JSON payload too short ({} bytes)",
            payload.len()
        )));
    }

    let token: CorrelationToken = payload[..4].try_into().expect("4-byte token");
    let json_len =
        u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]) as usize;

    if payload.len() < 8 + json_len {
        return Err(UcNetError::MalformedParameter(
            "JSON payload truncated".to_string(),
        ));
    }

    let body: ReplyBody = serde_json::from_slice(&payload[8..8 + json_len])?;

    let verdict = if body.id == "SubscriptionReply" {
        HandshakeVerdict::Accepted
    } else if body.id.starts_with("Subscription") {
        HandshakeVerdict::Rejected(body.id)
    } else {
        HandshakeVerdict::Unrelated(body.id)
    };

    Ok(HandshakeReply { token, verdict })
}
