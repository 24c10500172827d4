//! Error types for the todoist-history CLI.
//!
//! Provides structured error handling with:
//! - Error codes grouped by category (`ErrorCode`)
//! - Category-based exit codes (2=cache, 3=remote, 4=validation, 7=config, 8=io)
//! - Context-aware recovery hints

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for todoist-history operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Cache (exit 2)
    CacheError,

    // Remote (exit 3)
    RemoteFetchError,
    RemoteAuthError,

    // Validation (exit 4)
    InvalidArgument,

    // Config (exit 7)
    NoSourceConfigured,
    ConfigError,

    // I/O (exit 8)
    IoError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Category-based exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::CacheError => 2,
            Self::RemoteFetchError | Self::RemoteAuthError => 3,
            Self::InvalidArgument => 4,
            Self::NoSourceConfigured | Self::ConfigError => 7,
            Self::IoError => 8,
        }
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur while fetching, caching, or rendering history.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Either an API key or a database path must be provided")]
    NoSourceConfigured,

    #[error("Source 'cache' requested but no database path is configured")]
    CacheNotConfigured,

    #[error("Todoist request failed: {0}")]
    RemoteFetch(String),

    #[error("Todoist rejected the API key (HTTP {status})")]
    RemoteAuth { status: u16 },

    #[error("Cache error: {0}")]
    Cache(#[from] rusqlite::Error),

    #[error("Cannot open cache at {path}: {source}")]
    CacheOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NoSourceConfigured => ErrorCode::NoSourceConfigured,
            Self::CacheNotConfigured | Self::Config(_) => ErrorCode::ConfigError,
            Self::RemoteFetch(_) => ErrorCode::RemoteFetchError,
            Self::RemoteAuth { .. } => ErrorCode::RemoteAuthError,
            Self::Cache(_) | Self::CacheOpen { .. } => ErrorCode::CacheError,
            Self::Io(_) => ErrorCode::IoError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NoSourceConfigured => Some(
                "Pass --api-key or --db-path, set TODOIST_API_KEY or TODOIST_DB,\n  \
                 or add TodoistSettings.ApiKey / TodoistSettings.DatabasePath to appsettings.json"
                    .to_string(),
            ),
            Self::CacheNotConfigured => Some(
                "Pass --db-path or set TODOIST_DB, or drop `--source cache`".to_string(),
            ),
            Self::RemoteAuth { .. } => Some(
                "Check the API token under Todoist Settings > Integrations > Developer".to_string(),
            ),
            Self::RemoteFetch(_) => {
                Some("Nothing was written to the cache; re-run once Todoist is reachable".to_string())
            }
            Self::CacheOpen { path, .. } => Some(format!(
                "Check that {} is a writable SQLite database",
                path.display()
            )),
            Self::InvalidArgument(msg) if msg.contains("date") => {
                Some("Dates use the YYYY-MM-DD format, e.g. 2024-01-31".to_string())
            }
            Self::InvalidArgument(msg) if msg.contains("source") => {
                Some("Valid sources: remote (todoist), cache (database)".to_string())
            }
            Self::Cache(_)
            | Self::Io(_)
            | Self::InvalidArgument(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }
}
