//! Watermark resolution: where the next fetch or cache query starts.
//!
//! Precedence, highest first:
//! 1. An explicit from-date
//! 2. The most recent cached item (incremental mode only)
//! 3. The last task reference found in the notes directory
//! 4. Now minus the day window
//!
//! A miss at any step is not an error; resolution falls through to the next.

mod notes;

pub use notes::{NoteScanner, RegexNoteScanner};

use crate::error::Result;
use crate::model::TaskRef;
use crate::storage::CompletedItemCache;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use std::path::PathBuf;
use tracing::{debug, info};

/// Largest day window accepted.
pub const MAX_DAYS: u32 = 100;

/// Clamp a requested day window into `[0, MAX_DAYS]`.
#[must_use]
pub fn clamp_days(requested: i64) -> u32 {
    u32::try_from(requested.clamp(0, i64::from(MAX_DAYS))).unwrap_or(MAX_DAYS)
}

/// Midnight UTC at the start of `date`.
#[must_use]
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Which rule produced a watermark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatermarkSource {
    /// Explicit from-date.
    FromDate(NaiveDate),
    /// Most recent cached completion.
    LatestCached { id: String },
    /// Last task written to the notes. `anchor_id` is the cached completion
    /// the reference resolved to, if the cache knew it.
    Notes {
        task_ref: TaskRef,
        anchor_id: Option<String>,
    },
    /// Default look-back window.
    DaysWindow(u32),
}

/// Lower bound for the next fetch or cache query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    pub since: DateTime<Utc>,
    pub source: WatermarkSource,
}

impl Watermark {
    /// True when the watermark came from the cache's latest item, i.e. the
    /// next fetch only needs the recent delta.
    #[must_use]
    pub fn is_latest_cached(&self) -> bool {
        matches!(self.source, WatermarkSource::LatestCached { .. })
    }

    /// Completion the watermark was taken from. It has already been shown
    /// (it is in the notes or the cache), so display skips it.
    #[must_use]
    pub fn anchor_id(&self) -> Option<&str> {
        match &self.source {
            WatermarkSource::Notes { anchor_id, .. } => anchor_id.as_deref(),
            WatermarkSource::LatestCached { id } => Some(id),
            WatermarkSource::FromDate(_) | WatermarkSource::DaysWindow(_) => None,
        }
    }

    /// Notes reference the cache could not resolve. Display resolves it
    /// against the fetched items instead.
    #[must_use]
    pub fn unresolved_task_ref(&self) -> Option<&TaskRef> {
        match &self.source {
            WatermarkSource::Notes {
                task_ref,
                anchor_id: None,
            } => Some(task_ref),
            _ => None,
        }
    }
}

/// Whether resolution may resume from the cache's latest item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Sync paths: resume from the latest cached item when there is one.
    Incremental,
    /// Cache-only display: the latest item would leave nothing to show, so
    /// only the from-date, notes, and day window apply.
    Range,
}

/// Resolves watermarks from the configured inputs.
#[derive(Debug, Clone)]
pub struct WatermarkResolver<S = RegexNoteScanner> {
    from_date: Option<NaiveDate>,
    days: u32,
    notes_dir: Option<PathBuf>,
    scanner: S,
}

impl WatermarkResolver {
    /// Create a resolver using the regex note scanner. `days` is clamped.
    #[must_use]
    pub fn new(from_date: Option<NaiveDate>, days: u32, notes_dir: Option<PathBuf>) -> Self {
        Self {
            from_date,
            days: days.min(MAX_DAYS),
            notes_dir,
            scanner: RegexNoteScanner,
        }
    }
}

impl<S: NoteScanner> WatermarkResolver<S> {
    /// Swap the note-matching strategy.
    pub fn with_scanner<T: NoteScanner>(self, scanner: T) -> WatermarkResolver<T> {
        WatermarkResolver {
            from_date: self.from_date,
            days: self.days,
            notes_dir: self.notes_dir,
            scanner,
        }
    }

    /// Resolve the watermark.
    ///
    /// # Errors
    ///
    /// Returns an error only if a cache query fails.
    pub fn resolve(
        &self,
        cache: Option<&CompletedItemCache>,
        mode: ResolveMode,
        now: DateTime<Utc>,
    ) -> Result<Watermark> {
        let watermark = self.resolve_inner(cache, mode, now)?;
        info!(since = %watermark.since, source = ?watermark.source, "Resolved watermark");
        Ok(watermark)
    }

    fn resolve_inner(
        &self,
        cache: Option<&CompletedItemCache>,
        mode: ResolveMode,
        now: DateTime<Utc>,
    ) -> Result<Watermark> {
        if let Some(date) = self.from_date {
            return Ok(Watermark {
                since: start_of_day(date),
                source: WatermarkSource::FromDate(date),
            });
        }

        if mode == ResolveMode::Incremental {
            if let Some(latest) = cache.map(CompletedItemCache::most_recent).transpose()?.flatten() {
                return Ok(Watermark {
                    since: latest.completed_at,
                    source: WatermarkSource::LatestCached { id: latest.id },
                });
            }
        }

        if let Some(task_ref) = self
            .notes_dir
            .as_deref()
            .and_then(|dir| self.scanner.last_task_ref(dir))
        {
            let anchor = match cache {
                Some(cache) => cache.by_task_id_and_date(&task_ref.task_id, task_ref.date)?,
                None => None,
            };
            debug!(%task_ref, anchored = anchor.is_some(), "Using notes watermark");

            let since = anchor
                .as_ref()
                .map_or_else(|| start_of_day(task_ref.date), |item| item.completed_at);
            return Ok(Watermark {
                since,
                source: WatermarkSource::Notes {
                    task_ref,
                    anchor_id: anchor.map(|item| item.id),
                },
            });
        }

        Ok(Watermark {
            since: now - Duration::days(i64::from(self.days)),
            source: WatermarkSource::DaysWindow(self.days),
        })
    }
}
