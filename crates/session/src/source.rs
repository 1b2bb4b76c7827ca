use {
    async_trait::async_trait,
    tether_auth::{AccessToken, AuthClient, AuthError},
};

/// Supplies the access tokens a session connects with.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Exchange a user id and credential token for access tokens, in server order.
    async fn request_access_tokens(
        &self,
        user_id: &str,
        credential_token: &str,
    ) -> Result<Vec<AccessToken>, AuthError>;
}

#[async_trait]
impl TokenSource for AuthClient {
    async fn request_access_tokens(
        &self,
        user_id: &str,
        credential_token: &str,
    ) -> Result<Vec<AccessToken>, AuthError> {
        AuthClient::request_access_tokens(self, user_id, credential_token).await
    }
}
