use {tether_auth::AuthError, thiserror::Error};

/// Notification published to session subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The token exchange failed or produced nothing to connect with.
    AcquisitionFailed(AcquisitionError),
    /// A frame arrived from the hub while active; passed through untouched.
    MessageReceived(InboundFrame),
    /// The hub connection closed.
    Disconnected { code: u16, reason: String },
    /// The hub connection failed; ends the current attempt only.
    TransportError { detail: String },
}

/// Payload of an inbound hub frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    Binary(Vec<u8>),
}

/// Why a session never got as far as connecting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquisitionError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("auth server returned no access tokens")]
    NoAccessTokens,
}
