//! Data source selection.
//!
//! Decides, before anything touches the network or the cache, whether this
//! run reads from Todoist (with or without syncing the cache) or from the
//! cache alone.

use crate::error::Error;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// User override of automatic source selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOverride {
    Remote,
    Cache,
}

impl FromStr for SourceOverride {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "remote" | "todoist" | "api" => Ok(Self::Remote),
            "cache" | "database" | "db" => Ok(Self::Cache),
            other => Err(Error::InvalidArgument(format!("unknown source '{other}'"))),
        }
    }
}

impl fmt::Display for SourceOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote => f.write_str("remote"),
            Self::Cache => f.write_str("cache"),
        }
    }
}

/// Where this run gets its items from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePlan {
    /// Neither a credential nor a cache location; nothing to do.
    NoSourceAvailable,
    /// Fetch from Todoist and upsert into the cache.
    UseRemoteWithSync,
    /// Fetch from Todoist and display only.
    UseRemoteNoSync,
    /// Query the cache; no network.
    UseCacheOnly,
}

/// Inputs to source selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceInputs {
    pub has_credential: bool,
    pub has_cache: bool,
    pub source: Option<SourceOverride>,
    pub no_sync: bool,
}

/// Pick the source plan.
#[must_use]
pub fn select_source(inputs: SourceInputs) -> SourcePlan {
    if !inputs.has_credential && !inputs.has_cache {
        return SourcePlan::NoSourceAvailable;
    }

    if inputs.has_credential && inputs.source != Some(SourceOverride::Cache) {
        return if inputs.has_cache && !inputs.no_sync {
            SourcePlan::UseRemoteWithSync
        } else {
            SourcePlan::UseRemoteNoSync
        };
    }

    if inputs.source == Some(SourceOverride::Remote) {
        warn!("Source 'remote' requested without an API key; reading from the cache");
    }
    SourcePlan::UseCacheOnly
}
