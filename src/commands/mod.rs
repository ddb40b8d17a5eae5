//! Subcommand implementations and the setup they share.
pub mod apply;
pub mod archive;
pub mod cat;
pub mod data;
pub mod diff;
pub mod dump;
pub mod execute_template;
pub mod managed;
pub mod verify;

use std::collections::BTreeSet;
use std::io::Write as _;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context as _, Result};

use crate::cli::GlobalOpts;
use crate::config::{self, Config};
use crate::error::SourceStateError;
use crate::format::{Format, FormatRegistry};
use crate::logging::Logger;
use crate::persistent::{PersistentState, SqlitePersistentState};
use crate::platform::Platform;
use crate::state::{ApplyOptions, SourceState, slash_path};
use crate::system::{RealSystem, System};
use crate::template::default_funcs;

/// Version of the running tool, used for `.chezmoiversion` checks.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How the persistent state database is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateMode {
    /// Open or create the database for writing.
    ReadWrite,
    /// Open an existing database without writing.
    ReadOnly,
}

/// Shared state produced by the common command setup sequence.
///
/// Encapsulates platform detection and configuration loading, with the
/// command-line overrides applied, so that each command does not have to
/// repeat the boilerplate.
#[derive(Debug)]
pub struct CommandSetup {
    /// Detected host platform.
    pub platform: Platform,
    /// Configuration with command-line overrides applied.
    pub config: Config,
    /// Serialization formats for output and data files.
    pub formats: FormatRegistry,
    /// Destination directory, canonicalized when it exists.
    pub dest_dir: PathBuf,
}

impl CommandSetup {
    /// Detect the platform and load the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file fails to load.
    pub fn init(global: &GlobalOpts, log: &Logger) -> Result<Self> {
        let platform = Platform::detect();
        let config_file = global
            .config
            .clone()
            .unwrap_or_else(config::default_config_file);
        log.debug(&format!("config file: {}", config_file.display()));
        let mut config = Config::load(&config_file)?;
        if let Some(source) = &global.source {
            config.source_dir.clone_from(source);
        }
        if let Some(destination) = &global.destination {
            config.dest_dir.clone_from(destination);
        }
        if let Some(format) = &global.format {
            config.format.clone_from(format);
        }
        config.remove |= global.remove;
        let dest_dir =
            dunce::canonicalize(&config.dest_dir).unwrap_or_else(|_| config.dest_dir.clone());
        log.debug(&format!(
            "source directory: {}",
            config.source_dir.display()
        ));
        log.debug(&format!("destination directory: {}", dest_dir.display()));
        Ok(Self {
            platform,
            config,
            formats: FormatRegistry::with_defaults(),
            dest_dir,
        })
    }

    /// The live system, with the persistent state opened in `mode`.
    ///
    /// # Errors
    ///
    /// Returns an error if the state database cannot be opened.
    pub fn real_system(&self, mode: StateMode) -> Result<RealSystem> {
        let path = self.config.state_file();
        let persistent: Box<dyn PersistentState> = match mode {
            StateMode::ReadWrite => Box::new(SqlitePersistentState::open(&path)?),
            StateMode::ReadOnly => Box::new(SqlitePersistentState::open_read_only(&path)?),
        };
        let work_dir = if self.dest_dir.is_dir() {
            self.dest_dir.clone()
        } else {
            PathBuf::from(".")
        };
        Ok(RealSystem::new(persistent).with_work_dir(work_dir))
    }

    /// Build and read the source state through `system`.
    ///
    /// # Errors
    ///
    /// Returns configuration, template option and read errors.
    pub fn source_state<'a>(&'a self, system: &'a dyn System) -> Result<SourceState<'a>> {
        let source_dir = &self.config.source_dir;
        let engine = self.config.template_engine(default_funcs(source_dir))?;
        let mut state = SourceState::new(system, &self.formats, source_dir.clone())
            .with_umask(self.config.umask)
            .with_template_engine(engine)
            .with_encryption(self.config.encryption_tool())
            .with_template_data(self.platform.template_data(source_dir));
        if let Ok(version) = semver::Version::parse(VERSION) {
            state = state.with_version(version);
        }
        state.merge_template_data(self.config.data.clone());
        state.read()?;
        Ok(state)
    }

    /// The output format selected by `--format` or the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no format of that name is registered.
    pub fn output_format(&self) -> Result<&dyn Format> {
        Ok(self.formats.get(&self.config.format)?)
    }
}

/// Resolve command-line target arguments to target names.
///
/// Arguments are paths under `dest_dir`, relative ones taken from the
/// current directory. With no arguments every target is selected. With
/// `recursive`, a directory also selects every target beneath it. The
/// result is sorted and de-duplicated.
///
/// # Errors
///
/// Returns [`SourceStateError::NotInDestDir`] for an argument outside the
/// destination directory and [`SourceStateError::NotInSourceState`] for an
/// unmanaged one.
pub fn target_names(
    state: &SourceState<'_>,
    dest_dir: &Path,
    args: &[PathBuf],
    recursive: bool,
) -> Result<Vec<String>> {
    if args.is_empty() {
        return Ok(state.entries().keys().cloned().collect());
    }
    let cwd = std::env::current_dir().context("current directory")?;
    let mut names = BTreeSet::new();
    for arg in args {
        let abs = normalize(&cwd.join(arg));
        let rel = relative_to_dest(&abs, dest_dir)
            .ok_or_else(|| SourceStateError::NotInDestDir(arg.clone()))?;
        let name = slash_path(&rel);
        if name.is_empty() {
            names.extend(state.entries().keys().cloned());
            continue;
        }
        if state.entry(&name).is_none() {
            return Err(SourceStateError::NotInSourceState(name).into());
        }
        if recursive {
            let prefix = format!("{name}/");
            names.extend(
                state
                    .entries()
                    .range(prefix.clone()..)
                    .take_while(|(key, _)| key.starts_with(&prefix))
                    .map(|(key, _)| key.clone()),
            );
        }
        names.insert(name);
    }
    Ok(names.into_iter().collect())
}

/// Apply `names` in order through `system`.
///
/// # Errors
///
/// Stops at the first failing target.
pub fn apply_targets(
    state: &SourceState<'_>,
    system: &dyn System,
    target_dir: &Path,
    names: &[String],
    options: &ApplyOptions,
) -> Result<()> {
    for name in names {
        state.apply_one(system, target_dir, name, options)?;
    }
    Ok(())
}

/// Path of `abs` relative to the canonical `dest_dir`.
///
/// Symlinks in the existing ancestors of `abs` are resolved, so a
/// destination reached through a link still matches. The final component
/// is kept as written since it may itself be a managed symlink.
fn relative_to_dest(abs: &Path, dest_dir: &Path) -> Option<PathBuf> {
    if let Ok(rel) = abs.strip_prefix(dest_dir) {
        return Some(rel.to_path_buf());
    }
    if dunce::canonicalize(abs).is_ok_and(|real| real == dest_dir) {
        return Some(PathBuf::new());
    }
    let mut rest = vec![abs.file_name()?];
    let mut parent = abs.parent()?;
    let mut resolved = loop {
        if let Ok(real) = dunce::canonicalize(parent) {
            break real;
        }
        rest.push(parent.file_name()?);
        parent = parent.parent()?;
    };
    resolved.extend(rest.into_iter().rev());
    resolved.strip_prefix(dest_dir).ok().map(Path::to_path_buf)
}

/// Lexically resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Write command output to `--output` or stdout.
///
/// # Errors
///
/// Returns an error if the output cannot be written.
pub fn write_output(global: &GlobalOpts, data: &[u8]) -> Result<()> {
    match &global.output {
        Some(path) if path.as_os_str() != "-" => std::fs::write(path, data)
            .with_context(|| format!("Failed to write output: {}", path.display())),
        _ => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(data).context("Failed to write output")?;
            stdout.flush().context("Failed to write output")
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::persistent::MemoryPersistentState;

    fn state_for(
        src: &Path,
        system: &'static RealSystem,
        formats: &'static FormatRegistry,
    ) -> SourceState<'static> {
        let mut state = SourceState::new(system, formats, src.to_path_buf());
        state.read().unwrap();
        state
    }

    fn fixture() -> (tempfile::TempDir, SourceState<'static>) {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        for rel in [
            "dot_bashrc",
            "private_dot_ssh/config",
            "private_dot_ssh/known_hosts",
            "dot_sshrc",
        ] {
            let path = src.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "x").unwrap();
        }
        let persistent = Box::new(MemoryPersistentState::new());
        let system: &'static RealSystem = Box::leak(Box::new(RealSystem::new(persistent)));
        let formats: &'static FormatRegistry =
            Box::leak(Box::new(FormatRegistry::with_defaults()));
        let state = state_for(&src, system, formats);
        (dir, state)
    }

    #[test]
    fn no_arguments_selects_everything() {
        let (dir, state) = fixture();
        let names = target_names(&state, dir.path(), &[], true).unwrap();
        assert_eq!(
            names,
            [
                ".bashrc",
                ".ssh",
                ".ssh/config",
                ".ssh/known_hosts",
                ".sshrc"
            ]
        );
    }

    #[test]
    fn directories_recurse_and_results_are_deduplicated() {
        let (dir, state) = fixture();
        let dest = dir.path();
        let names = target_names(
            &state,
            dest,
            &[
                dest.join(".ssh"),
                dest.join(".ssh/config"),
                dest.join("./.bashrc"),
            ],
            true,
        )
        .unwrap();
        assert_eq!(
            names,
            [".bashrc", ".ssh", ".ssh/config", ".ssh/known_hosts"]
        );
    }

    #[test]
    fn non_recursive_selects_only_the_argument() {
        let (dir, state) = fixture();
        let names =
            target_names(&state, dir.path(), &[dir.path().join(".ssh")], false).unwrap();
        assert_eq!(names, [".ssh"]);
    }

    #[test]
    fn outside_destination_is_rejected() {
        let (dir, state) = fixture();
        let dest = dir.path().join("dest");
        let err = target_names(&state, &dest, &[PathBuf::from("/elsewhere")], true).unwrap_err();
        assert_eq!(err.to_string(), "/elsewhere: not in destination directory");
    }

    #[test]
    fn unmanaged_target_is_rejected() {
        let (dir, state) = fixture();
        let err =
            target_names(&state, dir.path(), &[dir.path().join(".zshrc")], true).unwrap_err();
        assert_eq!(err.to_string(), ".zshrc: not in source state");
    }

    #[cfg(unix)]
    #[test]
    fn destination_reached_through_symlink_is_accepted() {
        let (dir, state) = fixture();
        let outside = tempfile::tempdir().unwrap();
        let link = outside.path().join("home");
        std::os::unix::fs::symlink(dir.path(), &link).unwrap();
        let dest = dunce::canonicalize(dir.path()).unwrap();
        let names = target_names(
            &state,
            &dest,
            &[link.join(".bashrc"), link.join(".ssh/config")],
            false,
        )
        .unwrap();
        assert_eq!(names, [".bashrc", ".ssh/config"]);
        let all = target_names(&state, &dest, &[link], false).unwrap();
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn normalize_resolves_dots() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
    }
}
