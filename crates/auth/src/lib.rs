//! Credential exchange against the authentication origin.
//!
//! Two exchanges are supported: username/password for an auth token, and
//! user id/auth token for the ordered list of [`AccessToken`]s that scope the
//! persistent hub connection.

pub mod client;
pub mod endpoint;
pub mod error;
pub mod types;

pub use {
    client::AuthClient,
    endpoint::Endpoint,
    error::AuthError,
    types::AccessToken,
};
