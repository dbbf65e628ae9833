//! Configuration file location, TOML loading and secret resolution
//!
//! Configuration priority for every Lifesong service:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file never stops a service from starting; it logs a
//! warning and falls back to compiled defaults.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Directory name under the platform config dir (`~/.config/lifesong` on Linux)
const CONFIG_DIR_NAME: &str = "lifesong";

/// Default configuration file path for a module
///
/// Returns `<config_dir>/lifesong/<module_name>.toml`, or `None` if the
/// platform has no notion of a user config directory.
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(format!("{}.toml", module_name)))
}

/// Resolve which configuration file to load
///
/// An explicit path (CLI argument or its env fallback) always wins, even if
/// the file does not exist yet. Otherwise the platform default is used when
/// present.
pub fn resolve_config_path(explicit: Option<&Path>, module_name: &str) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    default_config_path(module_name).filter(|p| p.exists())
}

/// Load a TOML configuration file into `T`
///
/// - `None` path: compiled defaults
/// - Missing file: warning + compiled defaults
/// - Unreadable or malformed file: error (a broken config is not silently ignored)
pub fn load_toml_config<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        info!("No configuration file found, using compiled defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        warn!(
            "Configuration file {} not found, using compiled defaults",
            path.display()
        );
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Read TOML failed ({}): {}", path.display(), e))
    })?;

    let config = toml::from_str(&content)?;
    info!("Configuration loaded from {}", path.display());
    Ok(config)
}

/// Resolve a secret (API key) from environment then TOML
///
/// **Priority:** ENV → TOML
///
/// Blank values are treated as absent. Logs a warning when the secret is
/// present in more than one source, since that usually means a stale value
/// is lying around somewhere.
pub fn resolve_secret(name: &str, env_var: &str, toml_value: Option<&str>) -> Option<String> {
    let env_value = std::env::var(env_var).ok().filter(|k| is_valid_key(k));
    let toml_value = toml_value.filter(|k| is_valid_key(k));

    if env_value.is_some() && toml_value.is_some() {
        warn!(
            "{} found in both environment ({}) and TOML. Using environment (highest priority).",
            name, env_var
        );
    }

    if let Some(key) = env_value {
        info!("{} loaded from environment variable", name);
        return Some(key.trim().to_string());
    }

    if let Some(key) = toml_value {
        info!("{} loaded from TOML config", name);
        return Some(key.trim().to_string());
    }

    None
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
