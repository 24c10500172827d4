//! History command implementation (the default command).
//!
//! Resolves settings, picks a source, then prints completed tasks as
//! checklist lines on stdout. Status lines go to stdout as well unless
//! `--quiet` is set.

use crate::cli::FetchArgs;
use crate::config::{Settings, load_settings};
use crate::error::{Error, Result};
use crate::present::{prepare, write_items};
use crate::reconcile::{Reconciler, SyncMode};
use crate::remote::{CompletedSource, TodoistClient};
use crate::source::{SourceInputs, SourcePlan, select_source};
use crate::storage::CompletedItemCache;
use crate::watermark::{NoteScanner, ResolveMode, WatermarkResolver};
use chrono::{DateTime, Utc};
use colored::Colorize;
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, info};

/// Execute the history command.
///
/// # Errors
///
/// Returns an error if settings are invalid, no source is configured, or the
/// selected source fails.
pub fn execute(args: &FetchArgs, config: Option<&Path>, quiet: bool) -> Result<()> {
    let settings = load_settings(args.to_layer(), config)?;
    let plan = plan_for(&settings);
    info!(?plan, "Selected source");

    let remote = settings.api_key.as_deref().map(TodoistClient::new);
    let resolver = WatermarkResolver::new(
        settings.from_date,
        settings.days,
        settings.vault_path.clone(),
    );
    let history = History {
        settings: &settings,
        remote: remote.as_ref(),
        resolver: &resolver,
        quiet,
    };

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    rt.block_on(history.run(plan, Utc::now(), &mut out))?;
    out.flush()?;
    Ok(())
}

/// Source plan for resolved settings.
#[must_use]
pub fn plan_for(settings: &Settings) -> SourcePlan {
    select_source(SourceInputs {
        has_credential: settings.api_key.is_some(),
        has_cache: settings.database_path.is_some(),
        source: settings.source,
        no_sync: settings.no_sync,
    })
}

/// One history run over an already-selected plan.
pub struct History<'a, R, S> {
    pub settings: &'a Settings,
    pub remote: Option<&'a R>,
    pub resolver: &'a WatermarkResolver<S>,
    pub quiet: bool,
}

impl<R: CompletedSource, S: NoteScanner> History<'_, R, S> {
    /// Carry out `plan`, writing status and task lines to `out`.
    ///
    /// Returns the number of task lines written.
    ///
    /// # Errors
    ///
    /// Returns an error if no source is available or the source fails.
    pub async fn run<W: Write>(
        &self,
        plan: SourcePlan,
        now: DateTime<Utc>,
        out: &mut W,
    ) -> Result<usize> {
        let limit = usize::try_from(self.settings.limit).unwrap_or(usize::MAX);

        let items = match plan {
            SourcePlan::NoSourceAvailable => return Err(Error::NoSourceConfigured),

            SourcePlan::UseRemoteWithSync => {
                let remote = self.remote.ok_or(Error::NoSourceConfigured)?;
                let db_path = self
                    .settings
                    .database_path
                    .as_deref()
                    .ok_or(Error::CacheNotConfigured)?;

                self.status(out, "Fetching tasks from Todoist API...")?;
                let report = Reconciler::new(remote, self.resolver, db_path, self.settings.limit)
                    .sync(now)
                    .await?;

                let mode = match report.mode {
                    SyncMode::ColdStart => "full",
                    SyncMode::Incremental => "incremental",
                };
                self.status(
                    out,
                    &format!(
                        "Synchronized with database ({mode}): {} new, {} updated",
                        report.stats.inserted, report.stats.replaced
                    ),
                )?;
                if report.capped {
                    self.status(
                        out,
                        "Reached the incremental page size; use --from-date to backfill older completions",
                    )?;
                }
                prepare(report.fetched, &report.watermark, limit)
            }

            SourcePlan::UseRemoteNoSync => {
                let remote = self.remote.ok_or(Error::NoSourceConfigured)?;

                // Consult an existing cache for the watermark without creating one.
                let watermark = {
                    let cache = match self.settings.database_path.as_deref() {
                        Some(path) if path.is_file() => Some(CompletedItemCache::open(path)?),
                        _ => None,
                    };
                    self.resolver
                        .resolve(cache.as_ref(), ResolveMode::Incremental, now)?
                };

                self.status(out, "Fetching tasks from Todoist API...")?;
                let fetched = remote
                    .fetch_completed(watermark.since, self.settings.limit)
                    .await?;
                debug!(fetched = fetched.len(), "Fetched without sync");
                prepare(fetched, &watermark, limit)
            }

            SourcePlan::UseCacheOnly => {
                let db_path = self
                    .settings
                    .database_path
                    .as_deref()
                    .ok_or(Error::CacheNotConfigured)?;

                self.status(out, "Fetching tasks from database...")?;
                let cache = CompletedItemCache::open(db_path)?;
                let watermark = self.resolver.resolve(Some(&cache), ResolveMode::Range, now)?;
                let found = cache.range(watermark.since, now)?;
                prepare(found, &watermark, limit)
            }
        };

        if items.is_empty() {
            self.status(out, "No completed tasks found.")?;
        }
        write_items(out, &items)?;
        Ok(items.len())
    }

    fn status<W: Write>(&self, out: &mut W, message: &str) -> Result<()> {
        if !self.quiet {
            writeln!(out, "{}", message.dimmed())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_DAYS, DEFAULT_LIMIT};
    use crate::model::{CompletedItem, TaskRef};
    use chrono::TimeZone;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Remote returning canned items and recording each request.
    struct FakeRemote {
        items: Vec<CompletedItem>,
        calls: Mutex<Vec<(DateTime<Utc>, u32)>>,
    }

    impl FakeRemote {
        fn new(items: Vec<CompletedItem>) -> Self {
            Self {
                items,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(DateTime<Utc>, u32)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CompletedSource for FakeRemote {
        async fn fetch_completed(
            &self,
            since: DateTime<Utc>,
            limit: u32,
        ) -> Result<Vec<CompletedItem>> {
            self.calls.lock().unwrap().push((since, limit));
            Ok(self.items.clone())
        }
    }

    struct NoNotes;

    impl NoteScanner for NoNotes {
        fn last_task_ref(&self, _dir: &Path) -> Option<TaskRef> {
            None
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, 0, 0).unwrap()
    }

    fn item(id: &str, content: &str, completed_at: DateTime<Utc>) -> CompletedItem {
        CompletedItem::new(id, format!("8{id}"), content, completed_at, "p")
    }

    fn settings(api_key: Option<&str>, db: Option<PathBuf>) -> Settings {
        Settings {
            api_key: api_key.map(str::to_string),
            database_path: db,
            from_date: None,
            days: DEFAULT_DAYS,
            limit: DEFAULT_LIMIT,
            vault_path: None,
            source: None,
            no_sync: false,
        }
    }

    /// Notes directory whose last written task is fixed.
    struct WrittenNotes(TaskRef);

    impl NoteScanner for WrittenNotes {
        fn last_task_ref(&self, _dir: &Path) -> Option<TaskRef> {
            Some(self.0.clone())
        }
    }

    async fn run_to_string(
        settings: &Settings,
        remote: Option<&FakeRemote>,
        quiet: bool,
    ) -> Result<String> {
        let resolver = WatermarkResolver::new(settings.from_date, settings.days, None)
            .with_scanner(NoNotes);
        run_with_resolver(settings, remote, &resolver, quiet).await
    }

    async fn run_with_notes(
        settings: &Settings,
        remote: Option<&FakeRemote>,
        written: TaskRef,
    ) -> Result<String> {
        let resolver = WatermarkResolver::new(
            settings.from_date,
            settings.days,
            Some(PathBuf::from("notes")),
        )
        .with_scanner(WrittenNotes(written));
        run_with_resolver(settings, remote, &resolver, true).await
    }

    async fn run_with_resolver<S: NoteScanner>(
        settings: &Settings,
        remote: Option<&FakeRemote>,
        resolver: &WatermarkResolver<S>,
        quiet: bool,
    ) -> Result<String> {
        let history = History {
            settings,
            remote,
            resolver,
            quiet,
        };
        let mut out = Vec::new();
        history.run(plan_for(settings), now(), &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_no_source_is_an_error() {
        let err = run_to_string(&settings(None, None), None, true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoSourceConfigured));
    }

    #[tokio::test]
    async fn test_cache_only_prints_window_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("todoist.db");
        {
            let mut cache = CompletedItemCache::open(&db_path).unwrap();
            cache
                .upsert(&[
                    item("3", "Later", at(12, 9)),
                    item("1", "Too old", at(1, 9)),
                    item("2", "Earlier", at(10, 9)),
                ])
                .unwrap();
        }

        let output = run_to_string(&settings(None, Some(db_path)), None, true)
            .await
            .unwrap();
        assert_eq!(
            output,
            "- [x] [Earlier](https://app.todoist.com/app/task/82) ✅ 2024-01-10\n\
             - [x] [Later](https://app.todoist.com/app/task/83) ✅ 2024-01-12\n"
        );
    }

    #[tokio::test]
    async fn test_cache_only_status_lines_unless_quiet() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("todoist.db");

        let output = run_to_string(&settings(None, Some(db_path)), None, false)
            .await
            .unwrap();
        assert!(output.contains("Fetching tasks from database..."));
        assert!(output.contains("No completed tasks found."));
    }

    #[tokio::test]
    async fn test_forced_cache_without_path() {
        let mut forced = settings(Some("token"), None);
        forced.source = Some(crate::source::SourceOverride::Cache);
        let remote = FakeRemote::new(vec![]);

        let err = run_to_string(&forced, Some(&remote), true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CacheNotConfigured));
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_sync_prints_fetched_and_persists() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("todoist.db");
        let remote = FakeRemote::new(vec![
            item("2", "Second", at(11, 9)),
            item("1", "First", at(10, 9)),
        ]);

        let output = run_to_string(&settings(Some("token"), Some(db_path.clone())), Some(&remote), true)
            .await
            .unwrap();
        assert_eq!(output.lines().count(), 2);
        assert!(output.lines().next().unwrap().contains("[First]"));
        assert_eq!(remote.calls().len(), 1);

        let cache = CompletedItemCache::open(&db_path).unwrap();
        assert_eq!(cache.count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_incremental_sync_skips_already_cached_latest() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("todoist.db");
        {
            let mut cache = CompletedItemCache::open(&db_path).unwrap();
            cache.upsert(&[item("5", "Seen", at(12, 9))]).unwrap();
        }
        let remote = FakeRemote::new(vec![
            item("5", "Seen", at(12, 9)),
            item("6", "New", at(13, 9)),
        ]);

        let output = run_to_string(&settings(Some("token"), Some(db_path)), Some(&remote), true)
            .await
            .unwrap();
        assert_eq!(
            output,
            "- [x] [New](https://app.todoist.com/app/task/86) ✅ 2024-01-13\n"
        );
        assert_eq!(remote.calls(), vec![(at(12, 9), 50)]);
    }

    #[tokio::test]
    async fn test_no_sync_never_creates_cache() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("todoist.db");
        let mut no_sync = settings(Some("token"), Some(db_path.clone()));
        no_sync.no_sync = true;
        let remote = FakeRemote::new(vec![item("1", "Only", at(14, 9))]);

        let output = run_to_string(&no_sync, Some(&remote), true).await.unwrap();
        assert_eq!(output.lines().count(), 1);
        assert!(!db_path.exists());
        assert_eq!(remote.calls(), vec![(now() - chrono::Duration::days(7), DEFAULT_LIMIT)]);
    }

    #[tokio::test]
    async fn test_display_honors_limit() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("todoist.db");
        {
            let mut cache = CompletedItemCache::open(&db_path).unwrap();
            cache
                .upsert(&[
                    item("1", "a", at(10, 9)),
                    item("2", "b", at(11, 9)),
                    item("3", "c", at(12, 9)),
                ])
                .unwrap();
        }
        let mut limited = settings(None, Some(db_path));
        limited.limit = 2;

        let output = run_to_string(&limited, None, true).await.unwrap();
        assert_eq!(output.lines().count(), 2);
        assert!(output.contains("[a]"));
        assert!(!output.contains("[c]"));
    }

    fn written_on_the_10th() -> TaskRef {
        TaskRef::new("81", chrono::NaiveDate::from_ymd_opt(2024, 1, 10).unwrap())
    }

    #[tokio::test]
    async fn test_no_sync_skips_tasks_already_in_notes() {
        let mut no_sync = settings(Some("token"), None);
        no_sync.no_sync = true;
        let remote = FakeRemote::new(vec![
            item("0", "Same morning", at(10, 7)),
            item("1", "Already in notes", at(10, 9)),
            item("2", "New", at(10, 15)),
        ]);

        let output = run_with_notes(&no_sync, Some(&remote), written_on_the_10th())
            .await
            .unwrap();
        assert_eq!(
            output,
            "- [x] [New](https://app.todoist.com/app/task/82) ✅ 2024-01-10\n"
        );
        assert_eq!(remote.calls(), vec![(at(10, 0), DEFAULT_LIMIT)]);
    }

    #[tokio::test]
    async fn test_cold_start_sync_skips_tasks_already_in_notes() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("todoist.db");
        let remote = FakeRemote::new(vec![
            item("2", "New", at(10, 15)),
            item("1", "Already in notes", at(10, 9)),
        ]);

        let output = run_with_notes(
            &settings(Some("token"), Some(db_path.clone())),
            Some(&remote),
            written_on_the_10th(),
        )
        .await
        .unwrap();
        assert_eq!(
            output,
            "- [x] [New](https://app.todoist.com/app/task/82) ✅ 2024-01-10\n"
        );

        // Both are cached; only display skips the written one.
        let cache = CompletedItemCache::open(&db_path).unwrap();
        assert_eq!(cache.count().unwrap(), 2);
    }
}
