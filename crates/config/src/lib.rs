//! Configuration for the tether control-connection client.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{
        apply_env_overrides, clear_config_dir, config_dir, discover_and_load, load_config,
        set_config_dir,
    },
    schema::{AuthConfig, HubConfig, SessionConfig, TetherConfig},
};
