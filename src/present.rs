//! Markdown rendering of completed items.
//!
//! Each item becomes one Obsidian Tasks checklist line:
//!
//! ```text
//! - [x] [Buy milk](https://app.todoist.com/app/task/8123456789) ✅ 2024-01-10
//! ```
//!
//! The watermark scan in [`crate::watermark`] reads this same shape back.
//! Markdown-special characters in task content are written as-is.

use crate::model::CompletedItem;
use crate::watermark::Watermark;
use std::io::{self, Write};

/// Render a single checklist line.
#[must_use]
pub fn render_line(item: &CompletedItem) -> String {
    format!(
        "- [x] [{}]({}) ✅ {}",
        item.content,
        item.task_url(),
        item.completed_date().format("%Y-%m-%d")
    )
}

/// Order items for display.
///
/// Sorts ascending by completion time (stable, so equal timestamps keep their
/// input order), drops what was already shown, and keeps at most `limit`
/// items. Already shown means the item the watermark was anchored on or,
/// when a notes reference could not be resolved through the cache, the
/// matching item among `items` and everything completed at or before it.
#[must_use]
pub fn prepare(mut items: Vec<CompletedItem>, watermark: &Watermark, limit: usize) -> Vec<CompletedItem> {
    if let Some(anchor) = watermark.anchor_id() {
        items.retain(|item| item.id != anchor);
    }
    items.sort_by_key(|item| item.completed_at);

    if let Some(task_ref) = watermark.unresolved_task_ref() {
        let written = items
            .iter()
            .rev()
            .find(|item| item.task_id == task_ref.task_id && item.completed_date() == task_ref.date)
            .map(|item| item.completed_at);
        if let Some(cutoff) = written {
            items.retain(|item| item.completed_at > cutoff);
        }
    }

    items.truncate(limit);
    items
}

/// Write one line per item.
///
/// # Errors
///
/// Returns an error if the writer fails.
pub fn write_items<W: Write>(out: &mut W, items: &[CompletedItem]) -> io::Result<()> {
    for item in items {
        writeln!(out, "{}", render_line(item))?;
    }
    Ok(())
}
