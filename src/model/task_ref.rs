//! Task reference recovered from existing notes.

use chrono::NaiveDate;
use std::fmt;

/// A `(task_id, date)` pair pulled out of a previously written checklist line.
///
/// The date is the completion date the line was annotated with, so the pair
/// identifies one completion event of a possibly recurring task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRef {
    pub task_id: String,
    pub date: NaiveDate,
}

impl TaskRef {
    pub fn new(task_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            task_id: task_id.into(),
            date,
        }
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task {} on {}", self.task_id, self.date)
    }
}
