//! Remote source of completed items.
//!
//! [`CompletedSource`] is the seam between the reconciler and the network:
//! the Todoist HTTP client implements it in production and tests substitute
//! an in-memory fake.

mod todoist;

pub use todoist::{DEFAULT_ENDPOINT, TodoistClient};

use crate::error::Result;
use crate::model::CompletedItem;
use chrono::{DateTime, Utc};

/// Smallest page size accepted by the remote service.
pub const MIN_LIMIT: u32 = 1;

/// Largest page size accepted by the remote service.
pub const MAX_LIMIT: u32 = 1000;

/// Clamp a requested page size into `[MIN_LIMIT, MAX_LIMIT]`.
#[must_use]
pub fn clamp_limit(requested: i64) -> u32 {
    let clamped = requested.clamp(i64::from(MIN_LIMIT), i64::from(MAX_LIMIT));
    u32::try_from(clamped).unwrap_or(MAX_LIMIT)
}

/// A remote feed of completed items.
///
/// One call is one request: implementations do not retry or paginate.
pub trait CompletedSource: Send + Sync {
    /// Fetch items completed at or after `since`, at most `limit` of them.
    ///
    /// The returned order is whatever the remote yields.
    fn fetch_completed(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<CompletedItem>>> + Send;
}
