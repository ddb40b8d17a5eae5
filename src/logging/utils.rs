//! Log file location and timestamps.
use std::path::PathBuf;

use crate::config::xdg_dir;

/// `$XDG_CACHE_HOME/chezmoi`, falling back to `~/.cache/chezmoi`.
pub(super) fn log_dir() -> PathBuf {
    xdg_dir("XDG_CACHE_HOME", &[".cache"]).join("chezmoi")
}

/// Path of the log file for `command`, creating its directory. `None` when
/// the directory cannot be created.
pub(super) fn log_file_path(command: &str) -> Option<PathBuf> {
    let dir = log_dir();
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir.join(format!("{command}.log")))
}

/// UTC `YYYY-MM-DDTHH:MM:SSZ`, used in the run header.
pub(super) fn timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// UTC `HH:MM:SS.mmm`, used on every line.
pub(super) fn clock() -> String {
    chrono::Utc::now().format("%H:%M:%S%.3f").to_string()
}
