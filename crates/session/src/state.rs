use {
    secrecy::{ExposeSecret, Secret},
    tether_auth::AccessToken,
};

/// Where a control session is in its connect sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    /// No session attempt.
    #[default]
    Idle,
    /// Exchanging the credential for access tokens.
    AcquiringTokens,
    /// Tokens stored, opening the hub connection.
    Connecting,
    /// Connected, sending the registration frame.
    Registering,
    /// Registered; inbound frames are relayed.
    Active,
    /// The hub closed the connection.
    Disconnected,
    /// The attempt ended in an error.
    Failed,
}

impl ConnectionPhase {
    fn rank(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::AcquiringTokens => 1,
            Self::Connecting => 2,
            Self::Registering => 3,
            Self::Active => 4,
            Self::Disconnected | Self::Failed => 5,
        }
    }

    /// The attempt is over; only a new `start` leaves this phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed)
    }

    /// A `start` is accepted from this phase.
    pub fn can_start(self) -> bool {
        self == Self::Idle || self.is_terminal()
    }
}

/// Data owned by one session attempt.
///
/// Phases only move forward; reaching a terminal phase freezes the state.
pub struct SessionState {
    user_id: String,
    credential_token: Secret<String>,
    access_tokens: Vec<AccessToken>,
    phase: ConnectionPhase,
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("user_id", &self.user_id)
            .field("credential_token", &"[REDACTED]")
            .field("access_tokens", &self.access_tokens)
            .field("phase", &self.phase)
            .finish()
    }
}

impl SessionState {
    pub fn new(user_id: impl Into<String>, credential_token: Secret<String>) -> Self {
        Self {
            user_id: user_id.into(),
            credential_token,
            access_tokens: Vec::new(),
            phase: ConnectionPhase::Idle,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn credential_token(&self) -> &str {
        self.credential_token.expose_secret()
    }

    pub fn access_tokens(&self) -> &[AccessToken] {
        &self.access_tokens
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Move to `next` if it lies strictly ahead of the current phase.
    pub fn advance(&mut self, next: ConnectionPhase) -> bool {
        if self.phase.is_terminal() || next.rank() <= self.phase.rank() {
            return false;
        }
        self.phase = next;
        true
    }

    /// Store the exchanged tokens and enter `Connecting`.
    ///
    /// Refused for an empty list or outside `AcquiringTokens`.
    pub fn accept_tokens(&mut self, tokens: Vec<AccessToken>) -> bool {
        if tokens.is_empty() || self.phase != ConnectionPhase::AcquiringTokens {
            return false;
        }
        self.access_tokens = tokens;
        self.phase = ConnectionPhase::Connecting;
        true
    }

    /// The token used for the connection: always the first one returned.
    pub fn active_token(&self) -> Option<&AccessToken> {
        self.access_tokens.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(name: &str) -> AccessToken {
        AccessToken {
            token: name.into(),
            host: format!("{name}.host"),
            kind: "x".into(),
            port: 1,
            expiration: 0,
        }
    }

    fn state() -> SessionState {
        SessionState::new("alice", Secret::new("T1".into()))
    }

    #[test]
    fn phases_only_move_forward() {
        let mut s = state();
        assert!(s.advance(ConnectionPhase::AcquiringTokens));
        assert!(!s.advance(ConnectionPhase::AcquiringTokens));
        assert!(!s.advance(ConnectionPhase::Idle));
        assert!(s.advance(ConnectionPhase::Registering));
        assert!(!s.advance(ConnectionPhase::Connecting));
        assert!(s.advance(ConnectionPhase::Failed));
        assert!(!s.advance(ConnectionPhase::Disconnected));
        assert_eq!(s.phase(), ConnectionPhase::Failed);
    }

    #[test]
    fn tokens_only_accepted_while_acquiring() {
        let mut s = state();
        assert!(!s.accept_tokens(vec![token("a")]));
        assert!(s.access_tokens().is_empty());

        s.advance(ConnectionPhase::AcquiringTokens);
        assert!(!s.accept_tokens(Vec::new()));
        assert_eq!(s.phase(), ConnectionPhase::AcquiringTokens);

        assert!(s.accept_tokens(vec![token("a"), token("b")]));
        assert_eq!(s.phase(), ConnectionPhase::Connecting);
        assert_eq!(s.active_token().map(|t| t.token.as_str()), Some("a"));
        assert_eq!(s.access_tokens().len(), 2);
    }

    #[test]
    fn start_allowed_from_idle_and_terminal() {
        assert!(ConnectionPhase::Idle.can_start());
        assert!(ConnectionPhase::Failed.can_start());
        assert!(ConnectionPhase::Disconnected.can_start());
        assert!(!ConnectionPhase::Active.can_start());
        assert!(!ConnectionPhase::AcquiringTokens.can_start());
    }

    #[test]
    fn debug_hides_credential() {
        let out = format!("{:?}", state());
        assert!(out.contains("alice"));
        assert!(!out.contains("T1"));
    }
}
