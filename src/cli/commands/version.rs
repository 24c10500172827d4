//! Version command implementation.

use crate::error::Result;

/// Execute the version command.
///
/// # Errors
///
/// Infallible today; returns `Result` to match the other commands.
pub fn execute() -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let build = if cfg!(debug_assertions) {
        "dev"
    } else {
        "release"
    };

    println!("tdh version {version} ({build})");
    Ok(())
}
