//! Recover the last written task reference from existing notes.
//!
//! Note files are usually date-stamped (`2024-01-31.md`), so descending
//! filename order is treated as newest-first. Within a file, the last
//! matching line is the most recently written one.

use crate::model::TaskRef;
use chrono::NaiveDate;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, warn};

/// A task link (`.../task/<digits>`) followed later on the line by a date.
static TASK_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/task/(\d+)\b.*?(\d{4}-\d{2}-\d{2})").expect("task line regex should compile")
});

/// Strategy for finding the last task reference in a notes directory.
pub trait NoteScanner {
    /// The most recently written task reference, or `None` if nothing matches.
    fn last_task_ref(&self, dir: &Path) -> Option<TaskRef>;
}

/// Default scanner: regex over markdown lines, newest file first.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexNoteScanner;

impl NoteScanner for RegexNoteScanner {
    fn last_task_ref(&self, dir: &Path) -> Option<TaskRef> {
        let files = match markdown_files_newest_first(dir) {
            Ok(files) => files,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Cannot read notes directory");
                return None;
            }
        };

        for file in files {
            let content = match std::fs::read_to_string(&file) {
                Ok(c) => c,
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "Skipping unreadable note");
                    continue;
                }
            };

            if let Some(task_ref) = last_match(&content) {
                debug!(file = %file.display(), %task_ref, "Recovered task reference from notes");
                return Some(task_ref);
            }
        }

        None
    }
}

/// Markdown files directly inside `dir`, sorted by filename descending.
fn markdown_files_newest_first(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_md = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("md"));
        if is_md && entry.file_type()?.is_file() {
            files.push(path);
        }
    }

    files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
    Ok(files)
}

/// Reference on the last line in `content` that matches the task pattern.
///
/// Only that line counts. If its date is not a real calendar date the file
/// yields no reference; earlier lines are not consulted.
fn last_match(content: &str) -> Option<TaskRef> {
    let line = content.lines().rev().find(|line| TASK_LINE_RE.is_match(line))?;
    let task_ref = parse_line(line);
    if task_ref.is_none() {
        debug!(line, "Last task line has an invalid date");
    }
    task_ref
}

fn parse_line(line: &str) -> Option<TaskRef> {
    let caps = TASK_LINE_RE.captures(line)?;
    // Shapes like 2024-13-45 match the pattern but are not dates
    let date = NaiveDate::parse_from_str(&caps[2], "%Y-%m-%d").ok()?;
    Some(TaskRef::new(&caps[1], date))
}
