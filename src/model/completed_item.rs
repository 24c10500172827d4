//! Completed item model.
//!
//! A completed item is a single completion *event*. A recurring task that is
//! completed three times produces three items sharing one `task_id`.

use chrono::{DateTime, NaiveDate, SubsecRound, Utc};

/// Base URL for canonical task links.
pub const TASK_URL_BASE: &str = "https://app.todoist.com/app/task";

/// A task completion record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedItem {
    /// Completion-event identifier (primary key in the cache)
    pub id: String,

    /// Identifier of the task that was completed
    pub task_id: String,

    /// Task description at completion time
    pub content: String,

    /// Completion instant, UTC, millisecond precision
    pub completed_at: DateTime<Utc>,

    /// Owning project identifier
    pub project_id: String,
}

impl CompletedItem {
    /// Create a completed item, normalizing `completed_at` to the
    /// millisecond precision the cache stores.
    pub fn new(
        id: impl Into<String>,
        task_id: impl Into<String>,
        content: impl Into<String>,
        completed_at: DateTime<Utc>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            task_id: task_id.into(),
            content: content.into(),
            completed_at: completed_at.trunc_subsecs(3),
            project_id: project_id.into(),
        }
    }

    /// UTC calendar date of completion.
    #[must_use]
    pub fn completed_date(&self) -> NaiveDate {
        self.completed_at.date_naive()
    }

    /// Canonical link to the originating task.
    #[must_use]
    pub fn task_url(&self) -> String {
        format!("{TASK_URL_BASE}/{}", self.task_id)
    }
}
