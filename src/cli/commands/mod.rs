//! Command implementations.

pub mod completions;
pub mod history;
pub mod version;
