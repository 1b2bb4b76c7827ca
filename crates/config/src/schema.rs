//! Config schema types (auth origin, hub endpoint, session tuning).
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default authentication origin.
pub const DEFAULT_AUTH_ORIGIN: &str = "http://auth.toma.hk/";

/// Default hub endpoint for the persistent connection.
pub const DEFAULT_HUB_URL: &str = "ws://hatchet.toma.hk/";

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TetherConfig {
    pub auth: AuthConfig,
    pub hub: HubConfig,
    pub session: SessionConfig,
}

/// Authentication service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Base URL both exchanges are posted to (`<origin>/login`, `<origin>/tokens`).
    pub origin: String,

    /// Upper bound on a single HTTP exchange, in seconds.
    pub timeout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_AUTH_ORIGIN.into(),
            timeout_secs: 30,
        }
    }
}

impl AuthConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Hub (persistent connection) settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// WebSocket URL of the hub.
    pub url: String,

    /// Upper bound on the WebSocket handshake, in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_HUB_URL.into(),
            connect_timeout_secs: 15,
        }
    }
}

impl HubConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Control session tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Events buffered per subscriber before slow receivers start lagging.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            event_capacity: 256,
        }
    }
}
