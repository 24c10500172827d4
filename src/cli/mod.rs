//! CLI definitions using clap.

use crate::config::SettingsLayer;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod commands;

/// Print completed Todoist tasks as Obsidian Tasks checklist lines
#[derive(Parser, Debug)]
#[command(name = "tdh", author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub fetch: FetchArgs,

    /// Config file (default: ./appsettings.json, then ~/.todoist-history/config.json)
    #[arg(long, global = true, env = "TODOIST_HISTORY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (task lines and errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Options for the default history run.
///
/// Every option falls back to the config file and then to its `TODOIST_*`
/// environment variable, so none of them carry clap defaults.
#[derive(Args, Debug, Default, Clone)]
pub struct FetchArgs {
    /// Todoist API token
    #[arg(long)]
    pub api_key: Option<String>,

    /// SQLite cache of completed items
    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// Fetch from this date (YYYY-MM-DD), ignoring cache and notes
    #[arg(long)]
    pub from_date: Option<String>,

    /// Look-back window in days when nothing else sets a start (0-100)
    #[arg(long, allow_hyphen_values = true)]
    pub days: Option<i64>,

    /// Maximum number of tasks to fetch and print (1-1000)
    #[arg(long, allow_hyphen_values = true)]
    pub limit: Option<i64>,

    /// Notes directory scanned for the last task already written
    #[arg(long)]
    pub vault_path: Option<PathBuf>,

    /// Force a source: remote (todoist, api) or cache (database, db)
    #[arg(long)]
    pub source: Option<String>,

    /// Fetch from Todoist without writing to the cache
    #[arg(long)]
    pub no_sync: bool,
}

impl FetchArgs {
    /// Flags as the highest-precedence settings layer.
    ///
    /// An absent `--no-sync` is left unset so lower layers can still enable it.
    #[must_use]
    pub fn to_layer(&self) -> SettingsLayer {
        SettingsLayer {
            api_key: self.api_key.clone(),
            database_path: self.db_path.clone(),
            from_date: self.from_date.clone(),
            days: self.days,
            limit: self.limit,
            vault_path: self.vault_path.clone(),
            source: self.source.clone(),
            no_sync: self.no_sync.then_some(true),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Show version information
    Version,
}

/// Supported shells for completions.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}
