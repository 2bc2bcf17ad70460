//! Logging setup
//!
//! The terminal belongs to the chat loop, so tracing output goes to a log
//! file instead of stderr.

use crate::error::{Result, SqlChatError};
use std::fs::{self, File};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const APP_DIR: &str = "sql-chat";
const LOG_FILE: &str = "sql-chat.log";

/// Install a global subscriber writing to [`log_path`].
///
/// The filter comes from `RUST_LOG` and defaults to `info`. The file is
/// truncated on every start. Returns the path written to.
pub fn init_file_logging() -> Result<PathBuf> {
    let path = log_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(&path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(file)
        .with_ansi(false)
        .try_init()
        .map_err(|e| SqlChatError::config(format!("Failed to install logger: {}", e)))?;

    Ok(path)
}

/// Log file location: the platform state directory when there is one
/// (`~/.local/state/sql-chat/sql-chat.log` on Linux), else the config
/// directory, else the temp directory.
pub fn log_path() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::config_dir)
        .map(|dir| dir.join(APP_DIR).join(LOG_FILE))
        .unwrap_or_else(|| std::env::temp_dir().join(LOG_FILE))
}
