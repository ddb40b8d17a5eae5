// Shared helpers for integration tests.
//
// Provides a temporary-directory-backed source and destination tree and a
// fluent builder so each integration test can set up an isolated
// environment without repeating filesystem boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use chezmoi_cli::cli::GlobalOpts;
use chezmoi_cli::format::FormatRegistry;
use chezmoi_cli::state::SourceState;
use chezmoi_cli::system::System;

/// An isolated source/destination pair backed by a [`tempfile::TempDir`].
///
/// Layout:
/// - `src/`          - source directory
/// - `home/`         - destination directory
/// - `chezmoi.toml`  - configuration file (only if written)
/// - `out`           - command output file
pub struct IntegrationTestContext {
    /// Temporary directory containing the whole layout.
    pub root: tempfile::TempDir,
}

impl IntegrationTestContext {
    /// Create a new context with empty source and destination directories.
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        std::fs::create_dir_all(root.path().join("src")).expect("create source dir");
        std::fs::create_dir_all(root.path().join("home")).expect("create destination dir");
        Self { root }
    }

    pub fn source_dir(&self) -> PathBuf {
        self.root.path().join("src")
    }

    /// Destination directory, canonicalized so it compares equal to what
    /// the commands resolve.
    pub fn dest_dir(&self) -> PathBuf {
        let dest = self.root.path().join("home");
        dunce::canonicalize(&dest).unwrap_or(dest)
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.path().join("chezmoi.toml")
    }

    pub fn output_file(&self) -> PathBuf {
        self.root.path().join("out")
    }

    /// Global options pointing every directory into this context, with
    /// command output written to [`output_file`](Self::output_file).
    pub fn global_opts(&self) -> GlobalOpts {
        GlobalOpts {
            source: Some(self.source_dir()),
            destination: Some(self.dest_dir()),
            config: Some(self.config_file()),
            output: Some(self.output_file()),
            ..GlobalOpts::default()
        }
    }

    /// Contents of the command output file.
    pub fn output(&self) -> String {
        std::fs::read_to_string(self.output_file()).expect("read output")
    }

    /// Build and read a source state over this context's source directory.
    pub fn read_state<'a>(
        &self,
        system: &'a dyn System,
        formats: &'a FormatRegistry,
    ) -> SourceState<'a> {
        let mut state = SourceState::new(system, formats, self.source_dir());
        state.read().expect("read source state");
        state
    }

    pub fn dest_path(&self, rel: &str) -> PathBuf {
        self.dest_dir().join(rel)
    }

    pub fn read_dest(&self, rel: &str) -> String {
        std::fs::read_to_string(self.dest_path(rel)).expect("read destination file")
    }
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dir");
    }
    std::fs::write(path, content).expect("write file");
}

/// Fluent builder for [`IntegrationTestContext`].
pub struct TestContextBuilder {
    ctx: IntegrationTestContext,
}

impl TestContextBuilder {
    /// Begin building a new context with empty directories.
    pub fn new() -> Self {
        Self {
            ctx: IntegrationTestContext::new(),
        }
    }

    /// Write `content` to `src/<rel>`, creating parents.
    pub fn with_source_file(self, rel: &str, content: &str) -> Self {
        write(&self.ctx.source_dir().join(rel), content);
        self
    }

    /// Create the directory `src/<rel>`.
    pub fn with_source_dir(self, rel: &str) -> Self {
        std::fs::create_dir_all(self.ctx.source_dir().join(rel)).expect("create source dir");
        self
    }

    /// Write `content` to `home/<rel>`, creating parents.
    pub fn with_dest_file(self, rel: &str, content: &str) -> Self {
        write(&self.ctx.root.path().join("home").join(rel), content);
        self
    }

    /// Write the configuration file.
    pub fn with_config(self, content: &str) -> Self {
        write(&self.ctx.config_file(), content);
        self
    }

    /// Finish building and return the configured context.
    pub fn build(self) -> IntegrationTestContext {
        self.ctx
    }
}
