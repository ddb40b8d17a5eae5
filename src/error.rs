//! Domain-specific error types for the state engine.
//!
//! Each engine module has its own [`thiserror`] enum.
//! Engine modules return typed errors (e.g., [`SourceStateError`],
//! [`PatternError`]) or attach them to an [`anyhow::Error`] with context;
//! command handlers at the CLI boundary only see [`anyhow::Error`].
//!
//! [`ExitFailure`] is a separate sentinel with an empty message.
use std::path::PathBuf;

use thiserror::Error;

use crate::attr::SourceFileType;

/// Errors raised when encoding an attribute record into a source name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttributeError {
    /// A flag is set that the file type does not support.
    #[error("{name}: {flag} is not valid for a {file_type}")]
    Inconsistent {
        /// Target name of the record.
        name: String,
        /// Type of the record.
        file_type: SourceFileType,
        /// Name of the offending flag.
        flag: String,
    },
}

/// Errors raised when adding a pattern to a pattern set.
#[derive(Error, Debug)]
pub enum PatternError {
    /// The glob syntax is malformed.
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidGlob {
        /// The pattern as written.
        pattern: String,
        /// Underlying glob compiler error.
        source: globset::Error,
    },
}

/// One target name claimed by more than one source path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateTarget {
    /// Target name both paths decode to.
    pub target_name: String,
    /// Every source path that maps to the target name.
    pub source_paths: Vec<PathBuf>,
}

/// Errors raised while reading or resolving the source state.
#[derive(Error, Debug)]
pub enum SourceStateError {
    /// Two or more source paths decode to the same target name.
    #[error("{}", format_duplicates(.0))]
    DuplicateTargets(Vec<DuplicateTarget>),

    /// The source tree contains something that is neither a file nor a directory.
    #[error("{}: unsupported file type {mode:o}", .path.display())]
    UnsupportedFileType {
        /// Offending source path.
        path: PathBuf,
        /// File mode bits as reported by the system.
        mode: u32,
    },

    /// A `.chezmoidata.<ext>` file names a format that is not registered.
    #[error("{}: unknown format", .0.display())]
    UnknownFormat(PathBuf),

    /// A `.chezmoiversion` file demands a newer tool.
    #[error("source state requires version {required} or later, running {current}")]
    VersionTooOld {
        /// Largest version found in the source tree.
        required: semver::Version,
        /// Version of the running tool.
        current: semver::Version,
    },

    /// A target name was requested that the source state does not manage.
    #[error("{0}: not in source state")]
    NotInSourceState(String),

    /// The target argument does not live under the destination directory.
    #[error("{}: not in destination directory", .0.display())]
    NotInDestDir(PathBuf),

    /// `read` was called twice on the same instance.
    #[error("source state has already been read")]
    AlreadyRead,
}

/// Errors raised by format lookup in the [`FormatRegistry`](crate::format::FormatRegistry).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// No adapter is registered under the name.
    #[error("unknown format '{name}' (expected one of: {})", .known.join(", "))]
    Unknown {
        /// Name as requested.
        name: String,
        /// Names the registry does know.
        known: Vec<String>,
    },
}

/// Sentinel returned when verification fails.
///
/// Displays as the empty string so the CLI can exit non-zero without
/// printing a message.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("")]
pub struct ExitFailure;

fn format_duplicates(duplicates: &[DuplicateTarget]) -> String {
    duplicates
        .iter()
        .map(|d| {
            let paths: Vec<String> = d
                .source_paths
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            format!("{}: duplicate target ({})", d.target_name, paths.join(", "))
        })
        .collect::<Vec<_>>()
        .join("; ")
}
