//! Configuration management.
//!
//! Settings come from three places, highest precedence first:
//!
//! 1. Command-line flags
//! 2. A JSON config file with a `TodoistSettings` object
//! 3. `TODOIST_*` environment variables
//!
//! followed by built-in defaults. See [`settings::resolve`] for the merge.
//!
//! The config file is looked up as:
//! 1. An explicit `--config` path (must exist)
//! 2. `appsettings.json` in the working directory
//! 3. `~/.todoist-history/config.json`

mod settings;

pub use settings::{
    DEFAULT_DAYS, DEFAULT_LIMIT, ENV_API_KEY, ENV_DAYS, ENV_DB_PATH, ENV_FROM_DATE, ENV_LIMIT,
    ENV_NO_SYNC, ENV_SOURCE, ENV_VAULT, Settings, SettingsLayer, resolve,
};

use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file name looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "appsettings.json";

/// Shape of the JSON config file.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(rename = "TodoistSettings", default)]
    todoist_settings: SettingsLayer,
}

/// Get the global config directory (`~/.todoist-history/`).
#[must_use]
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".todoist-history"))
}

/// Find the config file to load, if any.
///
/// # Errors
///
/// Returns a configuration error if an explicit path does not exist.
pub fn discover_config_file(explicit: Option<&Path>, cwd: &Path) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(Error::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        return Ok(Some(path.to_path_buf()));
    }

    let local = cwd.join(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Ok(Some(local));
    }

    Ok(global_config_dir()
        .map(|dir| dir.join("config.json"))
        .filter(|p| p.is_file()))
}

/// Load the `TodoistSettings` layer from a config file.
///
/// # Errors
///
/// Returns a configuration error if the file cannot be read or parsed.
pub fn load_config_file(path: &Path) -> Result<SettingsLayer> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {e}", path.display()))
    })?;

    let file: ConfigFile = serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {e}", path.display()))
    })?;

    debug!(path = %path.display(), "Loaded config file");
    Ok(file.todoist_settings)
}

/// Resolve settings for this run from flags, the config file, and the
/// process environment.
///
/// # Errors
///
/// Returns an error if the config file or an environment value is malformed,
/// or if a resolved value fails validation.
pub fn load_settings(flags: SettingsLayer, config_path: Option<&Path>) -> Result<Settings> {
    let cwd = std::env::current_dir()?;
    let file = match discover_config_file(config_path, &cwd)? {
        Some(path) => load_config_file(&path)?,
        None => SettingsLayer::default(),
    };
    let env = SettingsLayer::from_env()?;

    let settings = resolve(&[flags, file, env])?;
    debug!(?settings, "Resolved settings");
    Ok(settings)
}
