//! Todoist completed-task history
//!
//! This crate provides the core functionality for the `tdh` CLI tool, which
//! prints completed Todoist tasks as Obsidian Tasks checklist lines and keeps
//! a local SQLite cache of them.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`config`] - Layered settings (flags, config file, environment)
//! - [`source`] - Remote vs. cache source selection
//! - [`watermark`] - Where a fetch or cache query starts
//! - [`remote`] - Todoist completed-items client
//! - [`storage`] - SQLite cache of completed items
//! - [`reconcile`] - Cache/remote synchronization
//! - [`present`] - Markdown line rendering
//! - [`model`] - Data types (`CompletedItem`, `TaskRef`)
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod present;
pub mod reconcile;
pub mod remote;
pub mod source;
pub mod storage;
pub mod watermark;

pub use error::{Error, Result};
