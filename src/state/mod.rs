//! Source state: the desired state derived from the source directory.
//!
//! A [`SourceState`] is populated by one [`read`](SourceState::read) of the
//! source tree and then queried. Target names are `/`-joined paths relative
//! to the destination directory, decoded from the source names, and unique.
//! File contents and rendered target states are resolved on first use and
//! cached for the lifetime of the state.
//!
//! Reconciliation walks target names in sorted order so that a directory is
//! always applied before its children.
mod dest;
mod entry;
mod merge;
mod target;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use serde_json::{Map, Value};

pub use dest::DestStateEntry;
pub use entry::{Lazy, SourceStateEntry};
pub use merge::recursive_merge;
pub use target::{POSIX_FILE_MODES, TargetStateEntry, sha256};

use crate::attr::{DirAttributes, FileAttributes, SourceFileType};
use crate::encryption::{EncryptionTool, NoEncryption};
use crate::error::{DuplicateTarget, SourceStateError};
use crate::format::FormatRegistry;
use crate::include::IncludeSet;
use crate::patterns::PatternSet;
use crate::system::{FileKind, System};
use crate::template::{TemplateEngine, default_funcs};

/// Reserved prefix of every control file name.
pub const CHEZMOI_PREFIX: &str = ".chezmoi";
/// Prefix of template data files.
pub const DATA_NAME: &str = ".chezmoidata";
/// Name of the ignore file.
pub const IGNORE_NAME: &str = ".chezmoiignore";
/// Name of the remove file.
pub const REMOVE_NAME: &str = ".chezmoiremove";
/// Directory of named templates.
pub const TEMPLATES_DIR_NAME: &str = ".chezmoitemplates";
/// Name of the minimum version file.
pub const VERSION_NAME: &str = ".chezmoiversion";

/// Umask applied when none is configured.
pub const DEFAULT_UMASK: u32 = 0o022;

/// Per-call options for [`SourceState::apply_all`] and
/// [`SourceState::apply_one`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Target kinds to apply; others are skipped without touching the
    /// destination.
    pub include: IncludeSet,
}

type Staged = BTreeMap<String, Vec<SourceStateEntry>>;

/// The desired state of every managed target.
pub struct SourceState<'a> {
    system: &'a dyn System,
    formats: &'a FormatRegistry,
    engine: TemplateEngine,
    encryption: Box<dyn EncryptionTool + 'a>,
    source_dir: PathBuf,
    umask: u32,
    version: Option<semver::Version>,
    default_data: Map<String, Value>,
    tree_data: Map<String, Value>,
    override_data: Map<String, Value>,
    data: Value,
    ignore: PatternSet,
    remove: PatternSet,
    min_version: Option<semver::Version>,
    entries: BTreeMap<String, SourceStateEntry>,
    read: bool,
}

impl fmt::Debug for SourceState<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceState")
            .field("source_dir", &self.source_dir)
            .field("umask", &format_args!("{:03o}", self.umask))
            .field("min_version", &self.min_version)
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl<'a> SourceState<'a> {
    /// Create an empty source state that reads `source_dir` through
    /// `system` and looks up data formats in `formats`.
    #[must_use]
    pub fn new(system: &'a dyn System, formats: &'a FormatRegistry, source_dir: PathBuf) -> Self {
        let engine = TemplateEngine::new(
            minijinja::UndefinedBehavior::Strict,
            default_funcs(&source_dir),
        );
        Self {
            system,
            formats,
            engine,
            encryption: Box::new(NoEncryption),
            source_dir,
            umask: DEFAULT_UMASK,
            version: None,
            default_data: Map::new(),
            tree_data: Map::new(),
            override_data: Map::new(),
            data: Value::Object(Map::new()),
            ignore: PatternSet::new(),
            remove: PatternSet::new(),
            min_version: None,
            entries: BTreeMap::new(),
            read: false,
        }
    }

    /// Permission bits masked off every target.
    #[must_use]
    pub const fn with_umask(mut self, umask: u32) -> Self {
        self.umask = umask;
        self
    }

    /// Replace the template engine (options and function table).
    #[must_use]
    pub fn with_template_engine(mut self, engine: TemplateEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Tool used to decrypt `encrypted_` sources.
    #[must_use]
    pub fn with_encryption(mut self, encryption: Box<dyn EncryptionTool + 'a>) -> Self {
        self.encryption = encryption;
        self
    }

    /// Version of the running tool, checked against `.chezmoiversion`.
    #[must_use]
    pub fn with_version(mut self, version: semver::Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Lowest-priority template data layer.
    #[must_use]
    pub fn with_template_data(mut self, data: Value) -> Self {
        self.default_data = into_map(data);
        self.refresh_data();
        self
    }

    /// Merge `data` into the highest-priority template data layer. It wins
    /// over both the defaults and every `.chezmoidata` file, whenever those
    /// are read.
    pub fn merge_template_data(&mut self, data: Value) {
        recursive_merge(&mut self.override_data, &into_map(data));
        self.refresh_data();
    }

    fn refresh_data(&mut self) {
        let mut data = self.default_data.clone();
        recursive_merge(&mut data, &self.tree_data);
        recursive_merge(&mut data, &self.override_data);
        self.data = Value::Object(data);
    }

    /// Root of the source directory.
    #[must_use]
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// The merged template data.
    #[must_use]
    pub const fn template_data(&self) -> &Value {
        &self.data
    }

    /// Every entry keyed by target name, in sorted order.
    #[must_use]
    pub const fn entries(&self) -> &BTreeMap<String, SourceStateEntry> {
        &self.entries
    }

    /// The entry for `target_name`, if managed.
    #[must_use]
    pub fn entry(&self, target_name: &str) -> Option<&SourceStateEntry> {
        self.entries.get(target_name)
    }

    /// Patterns read from every `.chezmoiignore`.
    #[must_use]
    pub const fn ignore(&self) -> &PatternSet {
        &self.ignore
    }

    /// Patterns read from every `.chezmoiremove`.
    #[must_use]
    pub const fn remove_patterns(&self) -> &PatternSet {
        &self.remove
    }

    /// Largest version required by any `.chezmoiversion` file.
    #[must_use]
    pub const fn min_version(&self) -> Option<&semver::Version> {
        self.min_version.as_ref()
    }

    // -----------------------------------------------------------------------
    // Read
    // -----------------------------------------------------------------------

    /// Walk the source directory and build the entry map.
    ///
    /// A missing source directory yields an empty state. On error no
    /// entries are exposed and the instance cannot be read again.
    ///
    /// # Errors
    ///
    /// Returns [`SourceStateError::AlreadyRead`] on a second call,
    /// [`SourceStateError::DuplicateTargets`] naming every conflict,
    /// [`SourceStateError::UnsupportedFileType`],
    /// [`SourceStateError::UnknownFormat`],
    /// [`SourceStateError::VersionTooOld`], template and I/O errors.
    pub fn read(&mut self) -> Result<()> {
        if self.read {
            return Err(SourceStateError::AlreadyRead.into());
        }
        self.read = true;

        match self.system.stat(&self.source_dir) {
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(
                    "{}: source directory does not exist",
                    self.source_dir.display()
                );
                return Ok(());
            }
            Err(err) => return Err(err).with_context(|| self.source_dir.display().to_string()),
        }

        let mut staged = Staged::new();
        let source_dir = self.source_dir.clone();
        self.walk(&source_dir, "", "", &mut staged)?;

        let mut duplicates = Vec::new();
        let mut entries = BTreeMap::new();
        for (target_name, mut sources) in staged {
            if sources.len() > 1 {
                duplicates.push(DuplicateTarget {
                    target_name,
                    source_paths: sources
                        .iter()
                        .map(|entry| entry.source_path().to_path_buf())
                        .collect(),
                });
            } else if let Some(entry) = sources.pop() {
                entries.insert(target_name, entry);
            }
        }
        if !duplicates.is_empty() {
            return Err(SourceStateError::DuplicateTargets(duplicates).into());
        }

        if let (Some(required), Some(current)) = (&self.min_version, &self.version) {
            if required > current {
                return Err(SourceStateError::VersionTooOld {
                    required: required.clone(),
                    current: current.clone(),
                }
                .into());
            }
        }

        tracing::debug!(
            "read {} entries from {}",
            entries.len(),
            self.source_dir.display()
        );
        self.entries = entries;
        Ok(())
    }

    /// Read one source directory. `source_rel` is the directory relative to
    /// the source root and `target_dir` the target name it maps to.
    fn walk(
        &mut self,
        dir: &Path,
        source_rel: &str,
        target_dir: &str,
        staged: &mut Staged,
    ) -> Result<()> {
        let mut children = self
            .system
            .read_dir(dir)
            .with_context(|| dir.display().to_string())?;
        // Control files apply to every sibling regardless of sort order.
        children.sort_by_key(|info| read_rank(&info.name));
        for info in children {
            let name = info.name.as_str();
            let path = dir.join(name);

            if let Some(suffix) = name.strip_prefix(DATA_NAME) {
                self.add_template_data(&path, suffix)?;
            } else if name == IGNORE_NAME {
                let text = self.render_control_file(&path)?;
                self.ignore
                    .add_lines(&text, source_rel)
                    .with_context(|| path.display().to_string())?;
            } else if name == REMOVE_NAME {
                let text = self.render_control_file(&path)?;
                self.remove
                    .add_lines(&text, target_dir)
                    .with_context(|| path.display().to_string())?;
            } else if name == TEMPLATES_DIR_NAME && info.kind == FileKind::Dir {
                self.add_templates_dir(&path)?;
            } else if name == VERSION_NAME {
                self.add_version(&path)?;
            } else if name.starts_with(CHEZMOI_PREFIX) {
                tracing::warn!("{}: unrecognized special file, ignoring", path.display());
            } else if name.starts_with('.') {
                tracing::debug!("{}: skipping", path.display());
            } else {
                match info.kind {
                    FileKind::Dir => {
                        let attributes = DirAttributes::parse(name);
                        let target_name = join_target(target_dir, &attributes.name);
                        if self.ignore.matches(&target_name) {
                            tracing::debug!("{target_name}: ignored");
                            continue;
                        }
                        let target = TargetStateEntry::Dir {
                            perm: self.dir_perm(&attributes),
                            exact: attributes.exact,
                        };
                        staged
                            .entry(target_name.clone())
                            .or_default()
                            .push(SourceStateEntry::Dir {
                                source_path: path.clone(),
                                attributes,
                                target,
                            });
                        let source_child = join_target(source_rel, name);
                        self.walk(&path, &source_child, &target_name, staged)?;
                    }
                    FileKind::File => {
                        let attributes = FileAttributes::parse(name);
                        let target_name = join_target(target_dir, &attributes.name);
                        if self.ignore.matches(&target_name) {
                            tracing::debug!("{target_name}: ignored");
                            continue;
                        }
                        staged
                            .entry(target_name)
                            .or_default()
                            .push(SourceStateEntry::File {
                                source_path: path,
                                attributes,
                                contents: Lazy::new(),
                                target: Lazy::new(),
                            });
                    }
                    FileKind::Symlink | FileKind::Other => {
                        return Err(SourceStateError::UnsupportedFileType {
                            path,
                            mode: info.mode,
                        }
                        .into());
                    }
                }
            }
        }
        Ok(())
    }

    fn add_template_data(&mut self, path: &Path, suffix: &str) -> Result<()> {
        let formats = self.formats;
        let format = suffix
            .strip_prefix('.')
            .and_then(|ext| formats.get(ext).ok())
            .ok_or_else(|| SourceStateError::UnknownFormat(path.to_path_buf()))?;
        let bytes = self
            .system
            .read_file(path)
            .with_context(|| path.display().to_string())?;
        let value = format
            .unmarshal(&bytes)
            .with_context(|| path.display().to_string())?;
        let Value::Object(map) = value else {
            bail!("{}: data is not a map", path.display());
        };
        recursive_merge(&mut self.tree_data, &map);
        self.refresh_data();
        Ok(())
    }

    fn render_control_file(&self, path: &Path) -> Result<String> {
        let bytes = self
            .system
            .read_file(path)
            .with_context(|| path.display().to_string())?;
        let rendered = self
            .engine
            .render(&path.display().to_string(), &bytes, &self.data)?;
        String::from_utf8(rendered).with_context(|| format!("{}: invalid UTF-8", path.display()))
    }

    fn add_templates_dir(&mut self, templates_dir: &Path) -> Result<()> {
        let mut pending = vec![templates_dir.to_path_buf()];
        while let Some(dir) = pending.pop() {
            let children = self
                .system
                .read_dir(&dir)
                .with_context(|| dir.display().to_string())?;
            for info in children {
                let path = dir.join(&info.name);
                match info.kind {
                    FileKind::Dir => pending.push(path),
                    FileKind::File => {
                        let name = slash_path(path.strip_prefix(templates_dir)?);
                        let bytes = self
                            .system
                            .read_file(&path)
                            .with_context(|| path.display().to_string())?;
                        let source = String::from_utf8(bytes)
                            .with_context(|| format!("{}: invalid UTF-8", path.display()))?;
                        self.engine.add_template(&name, &source)?;
                        tracing::debug!("registered template {name}");
                    }
                    FileKind::Symlink | FileKind::Other => {
                        return Err(SourceStateError::UnsupportedFileType {
                            path,
                            mode: info.mode,
                        }
                        .into());
                    }
                }
            }
        }
        Ok(())
    }

    fn add_version(&mut self, path: &Path) -> Result<()> {
        let bytes = self
            .system
            .read_file(path)
            .with_context(|| path.display().to_string())?;
        let text = String::from_utf8_lossy(&bytes);
        let version = semver::Version::parse(text.trim())
            .with_context(|| format!("{}: invalid version", path.display()))?;
        if self.min_version.as_ref().is_none_or(|min| version > *min) {
            self.min_version = Some(version);
        }
        Ok(())
    }

    const fn dir_perm(&self, attributes: &DirAttributes) -> u32 {
        let mut perm = 0o777;
        if attributes.private {
            perm &= !0o077;
        }
        perm & !self.umask
    }

    const fn file_perm(&self, attributes: &FileAttributes) -> u32 {
        let mut perm = 0o666;
        if attributes.executable {
            perm |= 0o111;
        }
        if attributes.private {
            perm &= !0o077;
        }
        perm & !self.umask
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    /// The resolved target state of `target_name`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceStateError::NotInSourceState`] for an unmanaged
    /// name, or the (cached) decryption or template error.
    pub fn target_state(&self, target_name: &str) -> Result<&TargetStateEntry> {
        let entry = self
            .entries
            .get(target_name)
            .ok_or_else(|| SourceStateError::NotInSourceState(target_name.to_string()))?;
        self.resolve(target_name, entry)
    }

    /// The source contents of a file entry: the raw bytes, decrypted when
    /// the entry is encrypted, before any template rendering. Directories
    /// have no contents.
    ///
    /// # Errors
    ///
    /// Returns the (cached) read or decryption error.
    pub fn contents<'e>(&self, entry: &'e SourceStateEntry) -> Result<Option<&'e [u8]>> {
        match entry {
            SourceStateEntry::Dir { .. } => Ok(None),
            SourceStateEntry::File {
                source_path,
                attributes,
                contents,
                ..
            } => self
                .file_contents(source_path, attributes, contents)
                .map(|c| Some(c.as_slice())),
        }
    }

    fn file_contents<'e>(
        &self,
        source_path: &Path,
        attributes: &FileAttributes,
        contents: &'e Lazy<Vec<u8>>,
    ) -> Result<&'e Vec<u8>> {
        contents.get_or_try_init(|| {
            let bytes = self
                .system
                .read_file(source_path)
                .with_context(|| source_path.display().to_string())?;
            if attributes.encrypted {
                self.encryption
                    .decrypt(&source_path.display().to_string(), &bytes)
            } else {
                Ok(bytes)
            }
        })
    }

    fn resolve<'e>(
        &self,
        target_name: &str,
        entry: &'e SourceStateEntry,
    ) -> Result<&'e TargetStateEntry> {
        match entry {
            SourceStateEntry::Dir { target, .. } => Ok(target),
            SourceStateEntry::File {
                source_path,
                attributes,
                contents,
                target,
            } => target.get_or_try_init(|| {
                let contents = self.file_contents(source_path, attributes, contents)?;
                let contents = if attributes.template {
                    self.engine
                        .render(&source_path.display().to_string(), contents, &self.data)?
                } else {
                    contents.clone()
                };
                Ok(match attributes.file_type {
                    SourceFileType::File => {
                        if contents.is_empty() && !attributes.empty {
                            TargetStateEntry::Absent
                        } else {
                            TargetStateEntry::File {
                                contents,
                                perm: self.file_perm(attributes),
                            }
                        }
                    }
                    SourceFileType::Script => TargetStateEntry::Script {
                        name: target_name.to_string(),
                        contents,
                        once: attributes.once,
                    },
                    SourceFileType::Symlink => TargetStateEntry::Symlink {
                        linkname: String::from_utf8_lossy(&contents).trim_end().to_string(),
                    },
                })
            }),
        }
    }

    /// Force resolution of every entry's contents and target state without
    /// touching any destination.
    ///
    /// # Errors
    ///
    /// Returns the first resolution error in target-name order.
    pub fn evaluate(&self) -> Result<()> {
        for (target_name, entry) in &self.entries {
            self.contents(entry)?;
            self.resolve(target_name, entry)?;
        }
        Ok(())
    }

    /// Render `source` as a template named `name` with the merged data.
    ///
    /// # Errors
    ///
    /// Returns the template error.
    pub fn execute_template_data(&self, name: &str, source: &[u8]) -> Result<Vec<u8>> {
        self.engine.render(name, source, &self.data)
    }

    // -----------------------------------------------------------------------
    // Apply
    // -----------------------------------------------------------------------

    /// Apply every target in sorted order.
    ///
    /// # Errors
    ///
    /// Stops at the first failing target; earlier targets stay applied.
    pub fn apply_all(
        &self,
        system: &dyn System,
        target_dir: &Path,
        options: &ApplyOptions,
    ) -> Result<()> {
        for target_name in self.entries.keys() {
            self.apply_one(system, target_dir, target_name, options)?;
        }
        Ok(())
    }

    /// Bring `target_dir/target_name` to its target state.
    ///
    /// # Errors
    ///
    /// Returns [`SourceStateError::NotInSourceState`], resolution errors and
    /// system errors, annotated with the destination path.
    pub fn apply_one(
        &self,
        system: &dyn System,
        target_dir: &Path,
        target_name: &str,
        options: &ApplyOptions,
    ) -> Result<()> {
        let target = self.target_state(target_name)?;
        if !options.include.includes(target) {
            return Ok(());
        }
        let path = target_dir.join(target_name);
        let dest = if matches!(target, TargetStateEntry::Script { .. }) {
            DestStateEntry::Absent
        } else {
            DestStateEntry::read(system, &path).with_context(|| path.display().to_string())?
        };
        target
            .apply(system, &path, &dest)
            .with_context(|| path.display().to_string())?;
        if let TargetStateEntry::Dir { exact: true, .. } = target {
            self.remove_untracked(system, &path, target_name)?;
        }
        Ok(())
    }

    fn remove_untracked(&self, system: &dyn System, path: &Path, target_name: &str) -> Result<()> {
        let children = match system.read_dir(path) {
            Ok(children) => children,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err).with_context(|| path.display().to_string()),
        };
        for child in children {
            let child_name = join_target(target_name, &child.name);
            if self.entries.contains_key(&child_name) || self.ignore.matches(&child_name) {
                continue;
            }
            let child_path = path.join(&child.name);
            system
                .remove_all(&child_path)
                .with_context(|| child_path.display().to_string())?;
        }
        Ok(())
    }

    /// Delete every destination path selected by the `.chezmoiremove`
    /// patterns.
    ///
    /// # Errors
    ///
    /// Returns the first glob or removal error.
    pub fn remove(&self, system: &dyn System, target_dir: &Path) -> Result<()> {
        let mut paths = BTreeSet::new();
        for include in self.remove.includes() {
            let prefix = glob::Pattern::escape(&target_dir.to_string_lossy());
            let pattern = Path::new(&prefix).join(include);
            let matches = system
                .glob(&pattern.to_string_lossy())
                .with_context(|| pattern.display().to_string())?;
            for path in matches {
                let Ok(rel) = path.strip_prefix(target_dir) else {
                    continue;
                };
                if self.remove.matches(&slash_path(rel)) {
                    paths.insert(path);
                }
            }
        }
        for path in paths {
            system
                .remove_all(&path)
                .with_context(|| path.display().to_string())?;
        }
        Ok(())
    }
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Order in which entries of one source directory are read: data first, then
/// the template library, then the other control files, then everything else.
fn read_rank(name: &str) -> u8 {
    if name.starts_with(DATA_NAME) {
        0
    } else if name == TEMPLATES_DIR_NAME {
        1
    } else if name.starts_with(CHEZMOI_PREFIX) {
        2
    } else {
        3
    }
}

/// Join a target name onto a parent target name (empty for the root).
#[must_use]
pub fn join_target(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

/// Render a relative path with `/` separators.
#[must_use]
pub fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::persistent::MemoryPersistentState;
    use crate::system::{CanarySystem, NullSystem, RealSystem};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::fs;

    fn real() -> RealSystem {
        RealSystem::new(Box::new(MemoryPersistentState::new()))
    }

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn names(state: &SourceState<'_>) -> Vec<String> {
        state.entries().keys().cloned().collect()
    }

    #[test]
    fn missing_source_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let system = real();
        let formats = FormatRegistry::with_defaults();
        let mut state = SourceState::new(&system, &formats, dir.path().join("missing"));
        state.read().unwrap();
        assert!(state.entries().is_empty());
    }

    #[test]
    fn second_read_fails() {
        let dir = tempfile::tempdir().unwrap();
        let system = real();
        let formats = FormatRegistry::with_defaults();
        let mut state = SourceState::new(&system, &formats, dir.path().to_path_buf());
        state.read().unwrap();
        let err = state.read().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SourceStateError>(),
            Some(SourceStateError::AlreadyRead)
        ));
    }

    #[test]
    fn target_names_are_decoded_and_control_files_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path();
        write(src, "dot_bashrc", "X");
        write(src, "private_dot_ssh/config", "Y");
        write(src, "exact_dot_config/private_exact_app/settings.tmpl", "Z");
        write(src, ".git/HEAD", "ref");
        write(src, ".chezmoiunknown", "");
        write(src, "run_once_install.sh", "echo hi");
        let system = real();
        let formats = FormatRegistry::with_defaults();
        let mut state = SourceState::new(&system, &formats, src.to_path_buf());
        state.read().unwrap();
        assert_eq!(
            names(&state),
            [
                ".bashrc",
                ".config",
                ".config/app",
                ".config/app/settings",
                ".ssh",
                ".ssh/config",
                "install.sh",
            ]
        );
    }

    #[test]
    fn duplicate_targets_name_every_source_path() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path();
        write(src, "dot_bashrc", "a");
        write(src, "dot_bashrc.tmpl", "b");
        write(src, "private_dot_bashrc", "c");
        let system = real();
        let formats = FormatRegistry::with_defaults();
        let mut state = SourceState::new(&system, &formats, src.to_path_buf());
        let err = state.read().unwrap_err();
        let Some(SourceStateError::DuplicateTargets(dups)) =
            err.downcast_ref::<SourceStateError>()
        else {
            panic!("unexpected {err:#}");
        };
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].target_name, ".bashrc");
        assert_eq!(dups[0].source_paths.len(), 3);
        assert!(state.entries().is_empty());
    }

    #[test]
    fn ignore_file_is_rendered_and_scoped() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path();
        write(src, ".chezmoiignore", "*.log\n!keep.log\n{{ extra }}\n");
        write(src, "a.log", "");
        write(src, "keep.log", "k");
        write(src, "secret", "s");
        write(src, "dot_config/.chezmoiignore", "settings\n");
        write(src, "dot_config/settings", "s");
        let system = real();
        let formats = FormatRegistry::with_defaults();
        let mut state = SourceState::new(&system, &formats, src.to_path_buf())
            .with_template_data(json!({"extra": "secret"}));
        state.read().unwrap();
        assert!(state.ignore().matches("dot_config/settings"));
        assert!(!state.ignore().matches(".config/settings"));
        assert_eq!(names(&state), [".config", ".config/settings", "keep.log"]);
    }

    #[test]
    fn ignore_file_covers_siblings_sorted_before_it() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path();
        write(src, ".chezmoiignore", "-secret\n+plus\n");
        write(src, "-secret", "s");
        write(src, "+plus", "p");
        write(src, "kept", "k");
        let system = real();
        let formats = FormatRegistry::with_defaults();
        let mut state = SourceState::new(&system, &formats, src.to_path_buf());
        state.read().unwrap();
        assert_eq!(names(&state), ["kept"]);
    }

    #[test]
    fn data_files_merge_between_defaults_and_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path();
        write(
            src,
            ".chezmoidata.json",
            r#"{"a": {"b": 1, "c": 2}, "d": "tree"}"#,
        );
        write(src, ".chezmoidata.toml", "[a]\ne = 3\n");
        let system = real();
        let formats = FormatRegistry::with_defaults();
        let mut state = SourceState::new(&system, &formats, src.to_path_buf())
            .with_template_data(json!({"d": "default", "f": "default"}));
        state.merge_template_data(json!({"a": {"c": 20}}));
        state.read().unwrap();
        assert_eq!(
            state.template_data(),
            &json!({"a": {"b": 1, "c": 20, "e": 3}, "d": "tree", "f": "default"})
        );
    }

    #[test]
    fn unknown_data_format_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".chezmoidata.ini", "a=1");
        let system = real();
        let formats = FormatRegistry::with_defaults();
        let mut state = SourceState::new(&system, &formats, dir.path().to_path_buf());
        let err = state.read().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SourceStateError>(),
            Some(SourceStateError::UnknownFormat(_))
        ));
    }

    #[test]
    fn version_constraint_keeps_the_largest() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".chezmoiversion", "2.1.0\n");
        write(dir.path(), "dot_config/.chezmoiversion", "2.3.0");
        let system = real();
        let formats = FormatRegistry::with_defaults();
        let mut state = SourceState::new(&system, &formats, dir.path().to_path_buf())
            .with_version(semver::Version::new(2, 2, 0));
        let err = state.read().unwrap_err();
        assert_eq!(
            err.to_string(),
            "source state requires version 2.3.0 or later, running 2.2.0"
        );
    }

    #[cfg(unix)]
    #[test]
    fn source_symlink_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink("elsewhere", dir.path().join("link")).unwrap();
        let system = real();
        let formats = FormatRegistry::with_defaults();
        let mut state = SourceState::new(&system, &formats, dir.path().to_path_buf());
        let err = state.read().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SourceStateError>(),
            Some(SourceStateError::UnsupportedFileType { .. })
        ));
    }

    #[test]
    fn file_permissions_follow_attributes_and_umask() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path();
        write(src, "plain", "p");
        write(src, "executable_run", "r");
        write(src, "private_executable_secret", "s");
        write(src, "private_dot_ssh/config", "c");
        let system = real();
        let formats = FormatRegistry::with_defaults();
        let mut state =
            SourceState::new(&system, &formats, src.to_path_buf()).with_umask(0o022);
        state.read().unwrap();
        let perm = |name: &str| match state.target_state(name).unwrap() {
            TargetStateEntry::File { perm, .. } | TargetStateEntry::Dir { perm, .. } => *perm,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(perm("plain"), 0o644);
        assert_eq!(perm("run"), 0o755);
        assert_eq!(perm("secret"), 0o700);
        assert_eq!(perm(".ssh"), 0o700);
    }

    #[test]
    fn empty_file_resolves_to_absent_unless_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path();
        write(src, "gone", "");
        write(src, "empty_kept", "");
        write(src, "rendered.tmpl", "{% if false %}x{% endif %}");
        let system = real();
        let formats = FormatRegistry::with_defaults();
        let mut state = SourceState::new(&system, &formats, src.to_path_buf());
        state.read().unwrap();
        assert_eq!(
            state.target_state("gone").unwrap(),
            &TargetStateEntry::Absent
        );
        assert_eq!(
            state.target_state("rendered").unwrap(),
            &TargetStateEntry::Absent
        );
        assert!(matches!(
            state.target_state("kept").unwrap(),
            TargetStateEntry::File { contents, .. } if contents.is_empty()
        ));
    }

    #[test]
    fn symlink_target_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "symlink_dot_motd.tmpl", "/etc/{{ name }}\n");
        let system = real();
        let formats = FormatRegistry::with_defaults();
        let mut state = SourceState::new(&system, &formats, dir.path().to_path_buf())
            .with_template_data(json!({"name": "motd"}));
        state.read().unwrap();
        assert_eq!(
            state.target_state(".motd").unwrap(),
            &TargetStateEntry::Symlink {
                linkname: "/etc/motd".to_string()
            }
        );
    }

    #[test]
    fn library_templates_are_includable() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path();
        write(src, ".chezmoitemplates/parts/header", "# {{ who }}\n");
        write(
            src,
            "dot_profile.tmpl",
            "{% include \"parts/header\" %}body\n",
        );
        let system = real();
        let formats = FormatRegistry::with_defaults();
        let mut state = SourceState::new(&system, &formats, src.to_path_buf())
            .with_template_data(json!({"who": "me"}));
        state.read().unwrap();
        assert_eq!(
            state.target_state(".profile").unwrap(),
            &TargetStateEntry::File {
                contents: b"# me\nbody\n".to_vec(),
                perm: 0o644 & !DEFAULT_UMASK,
            }
        );
    }

    #[test]
    fn template_error_is_cached_and_names_the_source() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "broken.tmpl", "{{ missing.key }}");
        let system = real();
        let formats = FormatRegistry::with_defaults();
        let mut state = SourceState::new(&system, &formats, dir.path().to_path_buf());
        state.read().unwrap();
        let first = state.target_state("broken").unwrap_err().to_string();
        let second = state.evaluate().unwrap_err().to_string();
        assert!(first.contains("broken.tmpl"), "{first}");
        assert_eq!(first, second);
    }

    #[test]
    fn evaluate_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.tmpl", "{{ chezmoi.os }}-{{ n }}");
        let system = real();
        let formats = FormatRegistry::with_defaults();
        let data = json!({"chezmoi": {"os": "linux"}, "n": 1});
        let resolve = || {
            let mut state = SourceState::new(&system, &formats, dir.path().to_path_buf())
                .with_template_data(data.clone());
            state.read().unwrap();
            state.evaluate().unwrap();
            state.target_state("a").unwrap().clone()
        };
        assert_eq!(resolve(), resolve());
    }

    #[test]
    fn include_set_skips_excluded_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(&src, "dot_bashrc", "X");
        write(&src, "dot_config/app", "Y");
        let system = real();
        let formats = FormatRegistry::with_defaults();
        let mut state = SourceState::new(&system, &formats, src);
        state.read().unwrap();
        let canary = CanarySystem::new(NullSystem);
        state
            .apply_all(
                &canary,
                Path::new("/home/user"),
                &ApplyOptions {
                    include: IncludeSet::DIRS,
                },
            )
            .unwrap();
        assert_eq!(canary.mutations(), ["mkdir /home/user/.config"]);
    }

    #[test]
    fn exact_directory_removes_untracked_children() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");
        write(&src, "exact_d/a", "a");
        write(&src, "exact_d/b", "b");
        write(&dest, "d/a", "a");
        write(&dest, "d/b", "b");
        write(&dest, "d/c", "c");
        let system = real();
        let formats = FormatRegistry::with_defaults();
        let mut state = SourceState::new(&system, &formats, src);
        state.read().unwrap();
        let canary = CanarySystem::new(&system);
        state
            .apply_one(&canary, &dest, "d", &ApplyOptions::default())
            .unwrap();
        let mut mutations = canary.mutations();
        mutations.retain(|m| !m.starts_with("chmod"));
        assert_eq!(
            mutations,
            [format!("remove_all {}", dest.join("d/c").display())]
        );
        assert!(dest.join("d/a").exists());
        assert!(!dest.join("d/c").exists());
    }

    #[test]
    fn apply_one_rejects_unmanaged_names() {
        let dir = tempfile::tempdir().unwrap();
        let system = real();
        let formats = FormatRegistry::with_defaults();
        let mut state = SourceState::new(&system, &formats, dir.path().to_path_buf());
        state.read().unwrap();
        let err = state
            .apply_one(&NullSystem, dir.path(), "nope", &ApplyOptions::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "nope: not in source state");
    }

    #[test]
    fn remove_deletes_matching_destination_paths() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");
        write(&src, ".chezmoiremove", "*.bak\n!keep.bak\n");
        write(&dest, "a.bak", "");
        write(&dest, "keep.bak", "");
        write(&dest, "other", "");
        let system = real();
        let formats = FormatRegistry::with_defaults();
        let mut state = SourceState::new(&system, &formats, src);
        state.read().unwrap();
        state.remove(&system, &dest).unwrap();
        assert!(!dest.join("a.bak").exists());
        assert!(dest.join("keep.bak").exists());
        assert!(dest.join("other").exists());
    }

    #[test]
    fn remove_treats_destination_metacharacters_literally() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("home[x]");
        let lookalike = dir.path().join("homex");
        write(&src, ".chezmoiremove", "*.bak\n");
        write(&dest, "a.bak", "");
        write(&lookalike, "a.bak", "");
        let system = real();
        let formats = FormatRegistry::with_defaults();
        let mut state = SourceState::new(&system, &formats, src);
        state.read().unwrap();
        state.remove(&system, &dest).unwrap();
        assert!(!dest.join("a.bak").exists());
        assert!(lookalike.join("a.bak").exists());
    }

    #[test]
    fn execute_template_data_uses_merged_data() {
        let dir = tempfile::tempdir().unwrap();
        let system = real();
        let formats = FormatRegistry::with_defaults();
        let mut state = SourceState::new(&system, &formats, dir.path().to_path_buf())
            .with_template_data(json!({"name": "world"}));
        state.read().unwrap();
        assert_eq!(
            state
                .execute_template_data("arg", b"hello {{ name }}")
                .unwrap(),
            b"hello world"
        );
    }
}
