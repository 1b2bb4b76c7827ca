/// Endpoint of the auth origin a payload is posted to.
///
/// The server distinguishes the two exchanges by path, and the path is picked
/// from the payload itself: any JSON object carrying an `authtoken` key goes to
/// `tokens`, everything else goes to `login`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// `POST <origin>/login`: username + password for an auth token.
    Login,
    /// `POST <origin>/tokens`: username + auth token for access tokens.
    Tokens,
}

impl Endpoint {
    /// Routing rule for an outgoing payload.
    pub fn for_payload(payload: &serde_json::Value) -> Self {
        if payload.get("authtoken").is_some() {
            Self::Tokens
        } else {
            Self::Login
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Tokens => "tokens",
        }
    }
}
