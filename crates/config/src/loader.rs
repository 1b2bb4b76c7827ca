use std::{
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::TetherConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["tether.toml", "tether.yaml", "tether.yml", "tether.json"];

/// Override for the config directory, set via `set_config_dir()`.
static CONFIG_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Set a custom config directory. When set, discovery only looks in this
/// directory; project-local and user-global paths are skipped.
pub fn set_config_dir(path: PathBuf) {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = Some(path);
}

/// Clear the config directory override, restoring default discovery.
pub fn clear_config_dir() {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = None;
}

fn config_dir_override() -> Option<PathBuf> {
    CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<TetherConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply `TETHER_*`
/// environment overrides.
///
/// Search order:
/// 1. `./tether.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/tether/tether.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `TetherConfig::default()` when no file is found or the file
/// cannot be parsed.
pub fn discover_and_load() -> TetherConfig {
    let mut config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                TetherConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            TetherConfig::default()
        },
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config
}

/// Override individual fields from `TETHER_*` variables.
///
/// Numeric variables that fail to parse are ignored with a warning.
pub fn apply_env_overrides(config: &mut TetherConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("TETHER_AUTH_ORIGIN") {
        config.auth.origin = v;
    }
    if let Some(v) = lookup("TETHER_HUB_URL") {
        config.hub.url = v;
    }
    if let Some(secs) = parse_secs(&lookup, "TETHER_AUTH_TIMEOUT_SECS") {
        config.auth.timeout_secs = secs;
    }
    if let Some(secs) = parse_secs(&lookup, "TETHER_HUB_CONNECT_TIMEOUT_SECS") {
        config.hub.connect_timeout_secs = secs;
    }
}

fn parse_secs(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(secs) => Some(secs),
        Err(e) => {
            warn!(key, value = %raw, error = %e, "ignoring invalid override");
            None
        },
    }
}

/// Find the first config file in standard locations.
///
/// When a config dir override is set, only that directory is searched.
fn find_config_file() -> Option<PathBuf> {
    if let Some(dir) = config_dir_override() {
        return first_existing(&dir);
    }

    // Project-local
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    home_dir()
        .map(|h| h.join(".config").join("tether"))
        .and_then(|dir| first_existing(&dir))
}

fn first_existing(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the config directory: override, or `~/.config/tether/`.
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = config_dir_override() {
        return Some(dir);
    }
    home_dir().map(|h| h.join(".config").join("tether"))
}

fn home_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<TetherConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
