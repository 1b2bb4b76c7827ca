use thiserror::Error;

/// Failure of an authentication exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The server set the envelope's error flag; carries its `errormsg`.
    #[error("rejected by auth server: {0}")]
    Rejected(String),

    /// The response did not have the expected shape.
    #[error("malformed auth response: {0}")]
    Malformed(String),

    /// Network, I/O, encoding or timeout failure.
    #[error("auth transport error: {0}")]
    Transport(String),
}

impl AuthError {
    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport("request timed out".into())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
