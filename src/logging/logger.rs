//! Logger handed to command handlers.
use std::path::{Path, PathBuf};

use super::STAGE_TARGET;
use super::utils::log_file_path;

/// Thin front end over [`tracing`] for command handlers.
///
/// Every event also lands in `$XDG_CACHE_HOME/chezmoi/<command>.log` once
/// [`init_subscriber`](super::init_subscriber) has run, whatever the console
/// verbosity.
#[derive(Debug)]
pub struct Logger {
    log_file: Option<PathBuf>,
}

#[allow(clippy::unused_self)]
impl Logger {
    /// Create a logger for `command`. Only records the log file path; the
    /// file itself is opened by the subscriber.
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            log_file: log_file_path(command),
        }
    }

    /// Path of the persistent log file, if one is open.
    #[must_use]
    pub fn log_path(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// Log an error.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// Log a warning.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// A phase of the command, such as reading the source state.
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: STAGE_TARGET, "{msg}");
    }

    /// Log progress detail shown with `--verbose`.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log debugging detail.
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }
}
