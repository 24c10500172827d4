//! Layered settings resolution.
//!
//! Every input (flags, config file, environment) is parsed into a
//! [`SettingsLayer`] of optional values. [`resolve`] walks the layers in
//! order and takes the first present value per key, then applies defaults
//! and clamping. Nothing here reads the process environment or the disk, so
//! the precedence rules are testable on their own.

use crate::error::{Error, Result};
use crate::remote::clamp_limit;
use crate::source::SourceOverride;
use crate::watermark::clamp_days;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

pub const ENV_API_KEY: &str = "TODOIST_API_KEY";
pub const ENV_DB_PATH: &str = "TODOIST_DB";
pub const ENV_FROM_DATE: &str = "TODOIST_FROM_DATE";
pub const ENV_DAYS: &str = "TODOIST_DAYS";
pub const ENV_LIMIT: &str = "TODOIST_LIMIT";
pub const ENV_VAULT: &str = "TODOIST_VAULT";
pub const ENV_SOURCE: &str = "TODOIST_SOURCE";
pub const ENV_NO_SYNC: &str = "TODOIST_NO_SYNC";

/// Day window used when nothing else sets one.
pub const DEFAULT_DAYS: u32 = 7;

/// Result limit used when nothing else sets one.
pub const DEFAULT_LIMIT: u32 = 200;

/// One source of optional settings.
///
/// Field names double as the config file keys under `TodoistSettings`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SettingsLayer {
    pub api_key: Option<String>,
    pub database_path: Option<PathBuf>,
    pub from_date: Option<String>,
    pub days: Option<i64>,
    pub limit: Option<i64>,
    pub vault_path: Option<PathBuf>,
    pub source: Option<String>,
    pub no_sync: Option<bool>,
}

impl SettingsLayer {
    /// Build a layer from environment-style lookups.
    ///
    /// Blank values count as unset.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the variable if a numeric or
    /// boolean value does not parse.
    pub fn from_env_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            api_key: get(ENV_API_KEY),
            database_path: get(ENV_DB_PATH).map(PathBuf::from),
            from_date: get(ENV_FROM_DATE),
            days: get(ENV_DAYS).map(|v| parse_int(ENV_DAYS, &v)).transpose()?,
            limit: get(ENV_LIMIT).map(|v| parse_int(ENV_LIMIT, &v)).transpose()?,
            vault_path: get(ENV_VAULT).map(PathBuf::from),
            source: get(ENV_SOURCE),
            no_sync: get(ENV_NO_SYNC).map(|v| parse_bool(ENV_NO_SYNC, &v)).transpose()?,
        })
    }

    /// Build a layer from the process environment.
    ///
    /// # Errors
    ///
    /// See [`SettingsLayer::from_env_with`].
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }
}

fn parse_int(key: &str, value: &str) -> Result<i64> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key} must be an integer, got '{value}'")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{key} must be true or false, got '{value}'"))),
    }
}

/// Fully resolved settings for one run.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_key: Option<String>,
    pub database_path: Option<PathBuf>,
    pub from_date: Option<NaiveDate>,
    /// Clamped to `[0, 100]`.
    pub days: u32,
    /// Clamped to `[1, 1000]`.
    pub limit: u32,
    pub vault_path: Option<PathBuf>,
    pub source: Option<SourceOverride>,
    pub no_sync: bool,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("database_path", &self.database_path)
            .field("from_date", &self.from_date)
            .field("days", &self.days)
            .field("limit", &self.limit)
            .field("vault_path", &self.vault_path)
            .field("source", &self.source)
            .field("no_sync", &self.no_sync)
            .finish()
    }
}

/// First non-blank string across layers.
fn first_str<'a>(
    layers: &'a [SettingsLayer],
    field: impl Fn(&'a SettingsLayer) -> Option<&'a String>,
) -> Option<&'a str> {
    layers
        .iter()
        .filter_map(field)
        .map(String::as_str)
        .find(|s| !s.trim().is_empty())
}

fn first_path<'a>(
    layers: &'a [SettingsLayer],
    field: impl Fn(&'a SettingsLayer) -> Option<&'a PathBuf>,
) -> Option<PathBuf> {
    layers
        .iter()
        .filter_map(field)
        .find(|p| !p.as_os_str().is_empty())
        .cloned()
}

fn first<T: Copy>(layers: &[SettingsLayer], field: impl Fn(&SettingsLayer) -> Option<T>) -> Option<T> {
    layers.iter().find_map(field)
}

/// Resolve settings from layers ordered highest precedence first.
///
/// # Errors
///
/// Returns an invalid-argument error if the winning from-date or source value
/// does not parse.
pub fn resolve(layers: &[SettingsLayer]) -> Result<Settings> {
    let from_date = first_str(layers, |l| l.from_date.as_ref())
        .map(|s| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|_| Error::InvalidArgument(format!("invalid from date '{s}'")))
        })
        .transpose()?;

    let source = first_str(layers, |l| l.source.as_ref())
        .map(str::parse::<SourceOverride>)
        .transpose()?;

    Ok(Settings {
        api_key: first_str(layers, |l| l.api_key.as_ref()).map(str::to_string),
        database_path: first_path(layers, |l| l.database_path.as_ref()),
        from_date,
        days: first(layers, |l| l.days).map_or(DEFAULT_DAYS, clamp_days),
        limit: first(layers, |l| l.limit).map_or(DEFAULT_LIMIT, clamp_limit),
        vault_path: first_path(layers, |l| l.vault_path.as_ref()),
        source,
        no_sync: first(layers, |l| l.no_sync).unwrap_or(false),
    })
}
