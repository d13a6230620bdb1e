//! Correlation token registry.
//!
//! Every parameter write carries a 4-byte correlation token. The client
//! starts with its own default, but the peer may assign a session-specific
//! token in the subscribe acknowledgment; once observed, all outbound
//! parameter frames must echo the session token or the peer silently
//! ignores them. The registry makes that switchover a single explicit
//! transition instead of ad hoc re-derivation at every call site.

/// A 4-byte correlation token echoed between peer and client.
pub type CorrelationToken = [u8; 4];

/// Default client-chosen token (`r\0e\0`), the value Universal Control
/// sends in its Subscribe and parameter frames.
pub const DEFAULT_CLIENT_TOKEN: CorrelationToken = [0x72, 0x00, 0x65, 0x00];

/// Tracks the client's default token and the peer-assigned session token.
#[derive(Debug, Clone)]
pub struct CorrelationRegistry {
    client_token: CorrelationToken,
    session_token: Option<CorrelationToken>,
}

impl CorrelationRegistry {
    /// Create a registry with the standard client token.
    pub fn new() -> Self {
        Self::with_client_token(DEFAULT_CLIENT_TOKEN)
    }

    /// Create a registry with a custom client token.
    pub fn with_client_token(client_token: CorrelationToken) -> Self {
        Self {
            client_token,
            session_token: None,
        }
    }

    /// The token outbound frames must carry right now: the session token
    /// once assigned, the client token until then.
    pub fn current_token(&self) -> CorrelationToken {
        self.session_token.unwrap_or(self.client_token)
    }

    /// Adopt the peer-assigned session token from an accepted handshake
    /// reply.
    pub fn adopt(&mut self, token: CorrelationToken) {
        tracing::debug!(token = ?token, "adopting session correlation token");
        self.session_token = Some(token);
    }

    /// Whether the peer has assigned a session token yet.
    pub fn has_session_token(&self) -> bool {
        self.session_token.is_some()
    }
}

impl Default for CorrelationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_client_token() {
        let registry = CorrelationRegistry::new();
        assert_eq!(registry.current_token(), DEFAULT_CLIENT_TOKEN);
        assert!(!registry.has_session_token());
    }

    #[test]
    fn test_adoption_switches_token() {
        let mut registry = CorrelationRegistry::new();
        let assigned = [0x65, 0x00, 0x6A, 0x00];

        registry.adopt(assigned);

        assert!(registry.has_session_token());
        assert_eq!(registry.current_token(), assigned);
    }

    #[test]
    fn test_custom_client_token() {
        let registry = CorrelationRegistry::with_client_token([1, 2, 3, 4]);
        assert_eq!(registry.current_token(), [1, 2, 3, 4]);
    }
}
