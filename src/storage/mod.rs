//! SQLite storage layer for the completed-items cache.
//!
//! # Submodules
//!
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Cache implementation

pub mod schema;
pub mod sqlite;

pub use sqlite::{CompletedItemCache, UpsertStats};
