//! Source-state entries and their lazily resolved values.
use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use anyhow::Result;

use super::target::TargetStateEntry;
use crate::attr::{DirAttributes, FileAttributes};

/// A value computed at most once. A failed computation is cached too: every
/// later access returns an error with the same message without running the
/// computation again.
#[derive(Debug, Default)]
pub struct Lazy<T> {
    cell: OnceCell<Result<T, String>>,
}

impl<T> Lazy<T> {
    /// An unresolved value.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Return the value, computing it with `init` on first access.
    ///
    /// # Errors
    ///
    /// Returns the (cached) error of the computation.
    pub fn get_or_try_init(&self, init: impl FnOnce() -> Result<T>) -> Result<&T> {
        self.cell
            .get_or_init(|| init().map_err(|err| format!("{err:#}")))
            .as_ref()
            .map_err(|msg| anyhow::Error::msg(msg.clone()))
    }

    /// Return `true` once the value (or its error) has been computed.
    pub fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }
}

/// One managed entry in the source directory.
#[derive(Debug)]
pub enum SourceStateEntry {
    /// A directory; its target state is known at read time.
    Dir {
        /// Path in the source directory.
        source_path: PathBuf,
        /// Attributes decoded from the name.
        attributes: DirAttributes,
        /// Target state of the directory.
        target: TargetStateEntry,
    },
    /// A file, script or symlink source. Contents (decrypted) and the
    /// target state (rendered) are resolved on first access.
    File {
        /// Path in the source directory.
        source_path: PathBuf,
        /// Attributes decoded from the name.
        attributes: FileAttributes,
        /// Decrypted source contents.
        contents: Lazy<Vec<u8>>,
        /// Resolved target state.
        target: Lazy<TargetStateEntry>,
    },
}

impl SourceStateEntry {
    /// Path of the entry in the source directory.
    #[must_use]
    pub fn source_path(&self) -> &Path {
        match self {
            Self::Dir { source_path, .. } | Self::File { source_path, .. } => source_path,
        }
    }
}
