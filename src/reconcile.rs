//! Reconcile the local cache with the remote completed-items feed.
//!
//! One sync is: resolve a watermark against the cache, make a single remote
//! request from that watermark, and upsert whatever comes back. Upsert is the
//! only write and it is keyed by id, so an aborted or repeated run converges
//! to the same cache contents.
//!
//! The cache is opened for the watermark lookup and again for the upsert. No
//! connection is held open while the remote request is in flight.

use crate::error::Result;
use crate::model::CompletedItem;
use crate::remote::{CompletedSource, clamp_limit};
use crate::storage::{CompletedItemCache, UpsertStats};
use crate::watermark::{NoteScanner, ResolveMode, Watermark, WatermarkResolver};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Page-size cap for incremental syncs.
///
/// Only the delta since the latest cached item is expected, so a small page
/// suffices. Tunable. Completions beyond a full page are not fetched, and the
/// next run resumes from the newest cached item, so the gap is only filled
/// by a run with an explicit from-date.
pub const INCREMENTAL_LIMIT: u32 = 50;

/// How a sync chose its fetch window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Cache was empty (or a from-date was given): broad fetch, full limit.
    ColdStart,
    /// Cache had items: fetch from the latest one with the small cap.
    Incremental,
}

/// Result of one sync run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub watermark: Watermark,
    pub mode: SyncMode,
    /// The remote returned a full incremental page, so completions may have
    /// been left behind.
    pub capped: bool,
    /// Items returned by the remote, in remote order.
    pub fetched: Vec<CompletedItem>,
    pub stats: UpsertStats,
}

/// Orchestrates a remote source and the on-disk cache.
pub struct Reconciler<'a, R, S> {
    remote: &'a R,
    resolver: &'a WatermarkResolver<S>,
    cache_path: PathBuf,
    limit: u32,
}

impl<'a, R: CompletedSource, S: NoteScanner> Reconciler<'a, R, S> {
    /// Create a reconciler. `limit` is the cold-start page size and is clamped.
    pub fn new(
        remote: &'a R,
        resolver: &'a WatermarkResolver<S>,
        cache_path: &Path,
        limit: u32,
    ) -> Self {
        Self {
            remote,
            resolver,
            cache_path: cache_path.to_path_buf(),
            limit: clamp_limit(i64::from(limit)),
        }
    }

    /// Run one sync.
    ///
    /// # Errors
    ///
    /// Returns a cache error if the cache cannot be opened or written, or a
    /// remote error if the fetch fails. A failed fetch writes nothing.
    pub async fn sync(&self, now: DateTime<Utc>) -> Result<SyncReport> {
        let watermark = {
            let cache = CompletedItemCache::open(&self.cache_path)?;
            self.resolver
                .resolve(Some(&cache), ResolveMode::Incremental, now)?
        };

        let (mode, limit) = if watermark.is_latest_cached() {
            (SyncMode::Incremental, INCREMENTAL_LIMIT.min(self.limit))
        } else {
            (SyncMode::ColdStart, self.limit)
        };

        info!(?mode, since = %watermark.since, limit, "Fetching completed items for sync");
        let fetched = self.remote.fetch_completed(watermark.since, limit).await?;

        let capped = mode == SyncMode::Incremental
            && usize::try_from(limit).is_ok_and(|page| fetched.len() >= page);
        if capped {
            warn!(
                limit,
                since = %watermark.since,
                "Incremental sync returned a full page; older completions may be missing"
            );
        }

        let stats = {
            let mut cache = CompletedItemCache::open(&self.cache_path)?;
            cache.upsert(&fetched)?
        };

        info!(
            fetched = fetched.len(),
            inserted = stats.inserted,
            replaced = stats.replaced,
            "Sync complete"
        );

        Ok(SyncReport {
            watermark,
            mode,
            capped,
            fetched,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::watermark::WatermarkSource;
    use chrono::{Duration, NaiveDate, TimeZone};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory remote that records every request it receives.
    #[derive(Default)]
    struct FakeRemote {
        items: Vec<CompletedItem>,
        fail: bool,
        calls: Mutex<Vec<(DateTime<Utc>, u32)>>,
    }

    impl FakeRemote {
        fn returning(items: Vec<CompletedItem>) -> Self {
            Self {
                items,
                ..Self::default()
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<(DateTime<Utc>, u32)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CompletedSource for FakeRemote {
        async fn fetch_completed(&self, since: DateTime<Utc>, limit: u32) -> Result<Vec<CompletedItem>> {
            self.calls.lock().unwrap().push((since, limit));
            if self.fail {
                return Err(Error::RemoteFetch("connection reset".into()));
            }
            Ok(self.items.clone())
        }
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn item(id: &str, completed_at: DateTime<Utc>) -> CompletedItem {
        CompletedItem::new(id, format!("t{id}"), format!("Task {id}"), completed_at, "p")
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_cold_start_uses_days_window_and_full_limit() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("cache.db");
        let remote = FakeRemote::returning(vec![item("2", at(2024, 1, 30)), item("1", at(2024, 1, 29))]);
        let resolver = WatermarkResolver::new(None, 7, None);

        let report = Reconciler::new(&remote, &resolver, &db, 300)
            .sync(now())
            .await
            .unwrap();

        assert_eq!(remote.calls(), vec![(now() - Duration::days(7), 300)]);
        assert_eq!(report.mode, SyncMode::ColdStart);
        assert_eq!(report.stats, UpsertStats { inserted: 2, replaced: 0 });
        assert_eq!(CompletedItemCache::open(&db).unwrap().count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_incremental_fetches_from_latest_cached() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("cache.db");
        let latest = at(2024, 1, 10);
        CompletedItemCache::open(&db)
            .unwrap()
            .upsert(&[item("4", latest)])
            .unwrap();

        let remote = FakeRemote::returning(vec![
            item("5", Utc.with_ymd_and_hms(2024, 1, 11, 9, 0, 0).unwrap()),
            item("6", Utc.with_ymd_and_hms(2024, 1, 12, 9, 0, 0).unwrap()),
        ]);
        let resolver = WatermarkResolver::new(None, 7, None);

        let report = Reconciler::new(&remote, &resolver, &db, 500)
            .sync(now())
            .await
            .unwrap();

        assert_eq!(remote.calls(), vec![(latest, INCREMENTAL_LIMIT)]);
        assert_eq!(report.mode, SyncMode::Incremental);
        assert_eq!(report.stats.inserted, 2);

        let cache = CompletedItemCache::open(&db).unwrap();
        assert_eq!(cache.count().unwrap(), 3);
        assert_eq!(cache.most_recent().unwrap().unwrap().id, "6");
    }

    #[tokio::test]
    async fn test_incremental_limit_never_exceeds_requested() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("cache.db");
        CompletedItemCache::open(&db)
            .unwrap()
            .upsert(&[item("1", at(2024, 1, 10))])
            .unwrap();

        let remote = FakeRemote::default();
        let resolver = WatermarkResolver::new(None, 7, None);
        Reconciler::new(&remote, &resolver, &db, 10)
            .sync(now())
            .await
            .unwrap();

        assert_eq!(remote.calls()[0].1, 10);
    }

    #[tokio::test]
    async fn test_full_incremental_page_is_reported_capped() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("cache.db");
        CompletedItemCache::open(&db)
            .unwrap()
            .upsert(&[item("1", at(2024, 1, 10))])
            .unwrap();

        let remote = FakeRemote::returning(vec![item("2", at(2024, 1, 11)), item("3", at(2024, 1, 12))]);
        let resolver = WatermarkResolver::new(None, 7, None);
        let report = Reconciler::new(&remote, &resolver, &db, 2)
            .sync(now())
            .await
            .unwrap();

        assert_eq!(report.mode, SyncMode::Incremental);
        assert!(report.capped);
    }

    #[tokio::test]
    async fn test_cold_start_is_never_capped() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("cache.db");

        let remote = FakeRemote::returning(vec![item("2", at(2024, 1, 29)), item("3", at(2024, 1, 30))]);
        let resolver = WatermarkResolver::new(None, 7, None);
        let report = Reconciler::new(&remote, &resolver, &db, 2)
            .sync(now())
            .await
            .unwrap();

        assert_eq!(report.mode, SyncMode::ColdStart);
        assert!(!report.capped);
    }

    #[tokio::test]
    async fn test_from_date_overrides_cache_watermark() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("cache.db");
        CompletedItemCache::open(&db)
            .unwrap()
            .upsert(&[item("1", at(2024, 1, 10))])
            .unwrap();

        let remote = FakeRemote::default();
        let from = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        let resolver = WatermarkResolver::new(Some(from), 7, None);
        let report = Reconciler::new(&remote, &resolver, &db, 200)
            .sync(now())
            .await
            .unwrap();

        assert_eq!(remote.calls(), vec![(at(2023, 6, 1), 200)]);
        assert_eq!(report.mode, SyncMode::ColdStart);
        assert_eq!(report.watermark.source, WatermarkSource::FromDate(from));
    }

    #[tokio::test]
    async fn test_overlapping_refetch_does_not_duplicate() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("cache.db");
        let remote = FakeRemote::returning(vec![item("1", at(2024, 1, 10)), item("2", at(2024, 1, 11))]);
        let resolver = WatermarkResolver::new(None, 30, None);
        let reconciler = Reconciler::new(&remote, &resolver, &db, 200);

        reconciler.sync(now()).await.unwrap();
        let second = reconciler.sync(now()).await.unwrap();

        assert_eq!(second.stats, UpsertStats { inserted: 0, replaced: 2 });
        assert_eq!(CompletedItemCache::open(&db).unwrap().count().unwrap(), 2);
        // Second run resumed from the latest cached item
        assert_eq!(remote.calls()[1], (at(2024, 1, 11), INCREMENTAL_LIMIT));
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_cache_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("cache.db");
        CompletedItemCache::open(&db)
            .unwrap()
            .upsert(&[item("1", at(2024, 1, 10))])
            .unwrap();

        let remote = FakeRemote::failing();
        let resolver = WatermarkResolver::new(None, 7, None);
        let err = Reconciler::new(&remote, &resolver, &db, 200)
            .sync(now())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::RemoteFetch(_)));
        let cache = CompletedItemCache::open(&db).unwrap();
        assert_eq!(cache.count().unwrap(), 1);
        assert_eq!(cache.most_recent().unwrap().unwrap().id, "1");
    }
}
