//! Data models for todoist-history.
//!
//! - [`CompletedItem`] - one task completion event
//! - [`TaskRef`] - a task reference recovered from existing notes

pub mod completed_item;
pub mod task_ref;

pub use completed_item::CompletedItem;
pub use task_ref::TaskRef;
