//! HTTP client for the auth origin.

use std::time::Duration;

use {
    anyhow::{Context, bail},
    reqwest::header::{ACCEPT, CONTENT_TYPE},
    serde::Serialize,
    serde_json::Value,
    tether_config::AuthConfig,
    tracing::{debug, warn},
    url::Url,
};

use crate::{
    endpoint::Endpoint,
    error::AuthError,
    types::{
        AccessToken, Envelope, LoginRequest, TokensRequest, parse_access_tokens,
        parse_auth_token,
    },
};

const JSON_UTF8: &str = "application/json; charset=utf-8";

/// Stateless request/response mapping over HTTP to the auth origin.
///
/// Both exchanges are bounded by the configured timeout and never retried
/// here; retry policy belongs to the caller.
#[derive(Debug, Clone)]
pub struct AuthClient {
    client: reqwest::Client,
    origin: Url,
}

impl AuthClient {
    pub fn new(config: &AuthConfig) -> anyhow::Result<Self> {
        Self::with_timeout(&config.origin, config.timeout())
    }

    pub fn with_timeout(origin: &str, timeout: Duration) -> anyhow::Result<Self> {
        let origin = parse_origin(origin)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, origin })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Exchange a username and password for an auth token.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let message = self.post(&LoginRequest { username, password }).await?;
        parse_auth_token(&message).inspect_err(|e| {
            warn!(endpoint = "login", error = %e, response = %message, "unexpected login response");
        })
    }

    /// Exchange a user id and auth token for access tokens, in server order.
    pub async fn request_access_tokens(
        &self,
        user_id: &str,
        auth_token: &str,
    ) -> Result<Vec<AccessToken>, AuthError> {
        let message = self
            .post(&TokensRequest {
                username: user_id,
                authtoken: auth_token,
            })
            .await?;
        let context = message.to_string();
        let tokens = parse_access_tokens(message).inspect_err(|e| {
            warn!(endpoint = "tokens", error = %e, response = %context, "unexpected tokens response");
        })?;
        debug!(count = tokens.len(), "received access tokens");
        Ok(tokens)
    }

    /// Post a payload to the endpoint its shape selects and unwrap the envelope.
    async fn post<T: Serialize>(&self, payload: &T) -> Result<Value, AuthError> {
        let payload = serde_json::to_value(payload)
            .map_err(|e| AuthError::Transport(format!("failed to encode request: {e}")))?;
        let endpoint = Endpoint::for_payload(&payload);
        let url = self
            .origin
            .join(endpoint.path())
            .map_err(|e| AuthError::Transport(format!("invalid endpoint url: {e}")))?;

        debug!(url = %url, "posting to auth server");

        let body = serde_json::to_vec(&payload)
            .map_err(|e| AuthError::Transport(format!("failed to encode request: {e}")))?;
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, JSON_UTF8)
            .header(ACCEPT, JSON_UTF8)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        debug!(endpoint = endpoint.path(), %status, bytes = text.len(), "auth server response");

        let envelope: Envelope = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(AuthError::Transport(format!("HTTP {status}")));
            },
            Err(e) => {
                warn!(endpoint = endpoint.path(), %status, body = %text, error = %e, "malformed auth envelope");
                return Err(AuthError::Malformed(format!("invalid envelope: {e}")));
            },
        };

        envelope.into_message()
    }
}

fn parse_origin(raw: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(raw).with_context(|| format!("invalid auth origin: {raw}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("auth origin must be http or https: {raw}");
    }
    // Url::join replaces the last segment unless the path ends with a slash.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
