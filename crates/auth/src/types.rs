use std::fmt;

use {
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

use crate::error::AuthError;

/// Credential scoping the persistent connection to one hub host/port.
///
/// `expiration` is carried as received and never checked.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
    pub host: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub port: u16,
    pub expiration: i64,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("kind", &self.kind)
            .field("expiration", &self.expiration)
            .finish()
    }
}

// ── Wire types ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Serialize)]
pub(crate) struct TokensRequest<'a> {
    pub username: &'a str,
    pub authtoken: &'a str,
}

/// Response envelope shared by both endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    errormsg: Option<String>,
    #[serde(default)]
    message: Option<Value>,
}

impl Envelope {
    /// The `message` payload, or the server's rejection.
    pub(crate) fn into_message(self) -> Result<Value, AuthError> {
        if self.is_error() {
            return Err(AuthError::Rejected(
                self.errormsg.unwrap_or_else(|| "unknown error".into()),
            ));
        }
        self.message
            .ok_or_else(|| AuthError::Malformed("envelope has no `message`".into()))
    }

    fn is_error(&self) -> bool {
        match &self.error {
            Some(Value::String(flag)) => flag == "true",
            Some(Value::Bool(flag)) => *flag,
            _ => false,
        }
    }
}

/// Extract `message.authtoken.token`.
pub(crate) fn parse_auth_token(message: &Value) -> Result<String, AuthError> {
    message
        .pointer("/authtoken/token")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| AuthError::Malformed("missing `message.authtoken.token`".into()))
}

/// Parse `message.accesstokens`, keeping server order.
pub(crate) fn parse_access_tokens(message: Value) -> Result<Vec<AccessToken>, AuthError> {
    let items = match message {
        Value::Object(mut map) => map.remove("accesstokens"),
        _ => None,
    };
    let Some(Value::Array(items)) = items else {
        return Err(AuthError::Malformed(
            "missing `message.accesstokens` array".into(),
        ));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value(item)
                .map_err(|e| AuthError::Malformed(format!("access token #{i}: {e}")))
        })
        .collect()
}
