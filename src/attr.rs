//! Source-name attribute codec.
//!
//! Every entry in the source directory encodes its target metadata in its
//! literal name. `private_dot_ssh` is the directory `.ssh` with owner-only
//! permissions; `executable_dot_local.tmpl` is the executable template file
//! `.local`. Decoding is total: a name that carries no recognised prefix
//! decodes to the default attributes with the name unchanged.
//!
//! Prefixes are stripped (and re-applied) in one fixed canonical order, so
//! `decode(encode(a)) == a` for every attribute record decoding can produce.
use std::fmt;

use crate::error::AttributeError;

/// Marks a leading `.` in the target name.
pub const DOT_PREFIX: &str = "dot_";
/// Keep a file even when its contents are empty.
pub const EMPTY_PREFIX: &str = "empty_";
/// Contents are encrypted.
pub const ENCRYPTED_PREFIX: &str = "encrypted_";
/// Directory removes untracked children.
pub const EXACT_PREFIX: &str = "exact_";
/// File is executable.
pub const EXECUTABLE_PREFIX: &str = "executable_";
/// Strip group and other permissions.
pub const PRIVATE_PREFIX: &str = "private_";
/// Script runs once per distinct body.
pub const RUN_ONCE_PREFIX: &str = "run_once_";
/// Script runs on every apply.
pub const RUN_PREFIX: &str = "run_";
/// Contents name a symlink target.
pub const SYMLINK_PREFIX: &str = "symlink_";
/// Contents are rendered as a template.
pub const TEMPLATE_SUFFIX: &str = ".tmpl";

/// What kind of target a source file produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SourceFileType {
    /// A regular file.
    #[default]
    File,
    /// A script that is executed rather than written.
    Script,
    /// A symbolic link whose target is the file's contents.
    Symlink,
}

impl fmt::Display for SourceFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Script => write!(f, "script"),
            Self::Symlink => write!(f, "symlink"),
        }
    }
}

/// Attributes decoded from a source directory name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirAttributes {
    /// Target name of the directory.
    pub name: String,
    /// Remove untracked children from the destination directory.
    pub exact: bool,
    /// Restrict permissions to the owner.
    pub private: bool,
}

impl DirAttributes {
    /// Decode the attributes of a source directory name.
    #[must_use]
    pub fn parse(source_name: &str) -> Self {
        let mut name = source_name;
        let private = strip(&mut name, PRIVATE_PREFIX);
        let exact = strip(&mut name, EXACT_PREFIX);
        Self {
            name: decode_dot(name),
            exact,
            private,
        }
    }

    /// Encode these attributes back into a source directory name.
    #[must_use]
    pub fn source_name(&self) -> String {
        let mut source_name = String::new();
        if self.private {
            source_name.push_str(PRIVATE_PREFIX);
        }
        if self.exact {
            source_name.push_str(EXACT_PREFIX);
        }
        source_name.push_str(&encode_dot(&self.name));
        source_name
    }
}

/// Attributes decoded from a source file name.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileAttributes {
    /// Target name of the file, script, or symlink.
    pub name: String,
    /// What the source produces.
    pub file_type: SourceFileType,
    /// Keep the file even when its contents are empty.
    pub empty: bool,
    /// Contents must be decrypted.
    pub encrypted: bool,
    /// Set the executable bits.
    pub executable: bool,
    /// Run the script at most once per distinct body.
    pub once: bool,
    /// Strip group and other permissions.
    pub private: bool,
    /// Render the contents as a template before use.
    pub template: bool,
}

impl FileAttributes {
    /// Decode the attributes of a source file name.
    ///
    /// Script and symlink prefixes are checked before the regular-file
    /// prefixes, and `run_once_` before `run_`, so the longest token wins.
    #[must_use]
    pub fn parse(source_name: &str) -> Self {
        let mut attrs = Self::default();
        let mut name = source_name;
        if strip(&mut name, RUN_ONCE_PREFIX) {
            attrs.file_type = SourceFileType::Script;
            attrs.once = true;
        } else if strip(&mut name, RUN_PREFIX) {
            attrs.file_type = SourceFileType::Script;
        } else if strip(&mut name, SYMLINK_PREFIX) {
            attrs.file_type = SourceFileType::Symlink;
        } else {
            attrs.private = strip(&mut name, PRIVATE_PREFIX);
            attrs.empty = strip(&mut name, EMPTY_PREFIX);
            attrs.executable = strip(&mut name, EXECUTABLE_PREFIX);
            attrs.encrypted = strip(&mut name, ENCRYPTED_PREFIX);
        }
        if let Some(stripped) = name.strip_suffix(TEMPLATE_SUFFIX) {
            name = stripped;
            attrs.template = true;
        }
        attrs.name = decode_dot(name);
        attrs
    }

    /// Encode these attributes back into a source file name.
    ///
    /// # Errors
    ///
    /// Returns an error if a flag is set that the file type cannot carry,
    /// e.g. `once` on a regular file or `executable` on a symlink.
    pub fn source_name(&self) -> Result<String, AttributeError> {
        let mut source_name = String::new();
        match self.file_type {
            SourceFileType::File => {
                if self.once {
                    return Err(self.inconsistent("once"));
                }
                for (set, prefix) in [
                    (self.private, PRIVATE_PREFIX),
                    (self.empty, EMPTY_PREFIX),
                    (self.executable, EXECUTABLE_PREFIX),
                    (self.encrypted, ENCRYPTED_PREFIX),
                ] {
                    if set {
                        source_name.push_str(prefix);
                    }
                }
            }
            SourceFileType::Script | SourceFileType::Symlink => {
                for (set, flag) in [
                    (self.private, "private"),
                    (self.empty, "empty"),
                    (self.executable, "executable"),
                    (self.encrypted, "encrypted"),
                ] {
                    if set {
                        return Err(self.inconsistent(flag));
                    }
                }
                if self.file_type == SourceFileType::Script {
                    source_name.push_str(if self.once {
                        RUN_ONCE_PREFIX
                    } else {
                        RUN_PREFIX
                    });
                } else if self.once {
                    return Err(self.inconsistent("once"));
                } else {
                    source_name.push_str(SYMLINK_PREFIX);
                }
            }
        }
        source_name.push_str(&encode_dot(&self.name));
        if self.template {
            source_name.push_str(TEMPLATE_SUFFIX);
        }
        Ok(source_name)
    }

    fn inconsistent(&self, flag: &str) -> AttributeError {
        AttributeError::Inconsistent {
            name: self.name.clone(),
            file_type: self.file_type,
            flag: flag.to_string(),
        }
    }
}

fn strip(name: &mut &str, prefix: &str) -> bool {
    match name.strip_prefix(prefix) {
        Some(rest) => {
            *name = rest;
            true
        }
        None => false,
    }
}

fn decode_dot(name: &str) -> String {
    name.strip_prefix(DOT_PREFIX)
        .map_or_else(|| name.to_string(), |rest| format!(".{rest}"))
}

fn encode_dot(name: &str) -> String {
    name.strip_prefix('.')
        .map_or_else(|| name.to_string(), |rest| format!("{DOT_PREFIX}{rest}"))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn parse_private_dot_dir() {
        let attrs = DirAttributes::parse("private_dot_ssh");
        assert_eq!(
            attrs,
            DirAttributes {
                name: ".ssh".to_string(),
                exact: false,
                private: true,
            }
        );
    }

    #[test]
    fn parse_private_exact_dir() {
        let attrs = DirAttributes::parse("private_exact_dot_config");
        assert!(attrs.private);
        assert!(attrs.exact);
        assert_eq!(attrs.name, ".config");
    }

    #[test]
    fn dir_names_without_prefixes_are_unchanged() {
        for name in ["dir", "dir.tmpl", "run_dir", "symlink_dir", "empty_dir"] {
            let attrs = DirAttributes::parse(name);
            assert_eq!(attrs.name, name);
            assert!(!attrs.exact && !attrs.private);
        }
    }

    #[test]
    fn dir_attributes_round_trip() {
        for name in [
            ".dir",
            "dir.tmpl",
            "dir",
            "empty_dir",
            "encrypted_dir",
            "executable_dir",
            "once_dir",
            "run_dir",
            "run_once_dir",
            "symlink_dir",
        ] {
            for exact in [false, true] {
                for private in [false, true] {
                    let attrs = DirAttributes {
                        name: name.to_string(),
                        exact,
                        private,
                    };
                    let source_name = attrs.source_name();
                    let parsed = DirAttributes::parse(&source_name);
                    assert_eq!(parsed, attrs, "source name {source_name}");
                    assert_eq!(parsed.source_name(), source_name);
                }
            }
        }
    }

    #[test]
    fn parse_regular_file_flags() {
        let attrs = FileAttributes::parse("private_executable_dot_profile.tmpl");
        assert_eq!(attrs.file_type, SourceFileType::File);
        assert_eq!(attrs.name, ".profile");
        assert!(attrs.private);
        assert!(attrs.executable);
        assert!(attrs.template);
        assert!(!attrs.empty && !attrs.encrypted && !attrs.once);
    }

    #[test]
    fn parse_run_once_script() {
        let attrs = FileAttributes::parse("run_once_install.sh");
        assert_eq!(attrs.file_type, SourceFileType::Script);
        assert_eq!(attrs.name, "install.sh");
        assert!(attrs.once);
    }

    #[test]
    fn run_prefix_does_not_swallow_run_once() {
        let attrs = FileAttributes::parse("run_once_x");
        assert_eq!(attrs.name, "x");
        let attrs = FileAttributes::parse("run_oncex");
        assert_eq!(attrs.name, "oncex");
        assert!(!attrs.once);
    }

    #[test]
    fn executable_is_not_split() {
        let attrs = FileAttributes::parse("executable_bin");
        assert!(attrs.executable);
        assert_eq!(attrs.name, "bin");
        let attrs = FileAttributes::parse("exec_bin");
        assert!(!attrs.executable);
        assert_eq!(attrs.name, "exec_bin");
    }

    #[test]
    fn parse_symlink_template() {
        let attrs = FileAttributes::parse("symlink_dot_vimrc.tmpl");
        assert_eq!(attrs.file_type, SourceFileType::Symlink);
        assert_eq!(attrs.name, ".vimrc");
        assert!(attrs.template);
    }

    #[test]
    fn file_attributes_round_trip() {
        let mut all = Vec::new();
        for name in [".name", "exact_name", "name"] {
            for bits in 0..32u8 {
                all.push(FileAttributes {
                    name: name.to_string(),
                    file_type: SourceFileType::File,
                    empty: bits & 1 != 0,
                    encrypted: bits & 2 != 0,
                    executable: bits & 4 != 0,
                    private: bits & 8 != 0,
                    template: bits & 16 != 0,
                    once: false,
                });
            }
        }
        for name in ["exact_name", "name"] {
            for once in [false, true] {
                all.push(FileAttributes {
                    name: name.to_string(),
                    file_type: SourceFileType::Script,
                    once,
                    ..FileAttributes::default()
                });
            }
            all.push(FileAttributes {
                name: name.to_string(),
                file_type: SourceFileType::Symlink,
                ..FileAttributes::default()
            });
        }
        for attrs in all {
            let source_name = attrs.source_name().unwrap();
            let parsed = FileAttributes::parse(&source_name);
            assert_eq!(parsed, attrs, "source name {source_name}");
            assert_eq!(parsed.source_name().unwrap(), source_name);
        }
    }

    #[test]
    fn canonical_names_round_trip() {
        for name in [
            "dot_bashrc",
            "private_empty_executable_encrypted_dot_x.tmpl",
            "run_once_install.sh",
            "run_update.sh.tmpl",
            "symlink_dot_vimrc",
            "plain",
        ] {
            let attrs = FileAttributes::parse(name);
            assert_eq!(attrs.source_name().unwrap(), name);
        }
    }

    #[test]
    fn once_on_regular_file_is_inconsistent() {
        let attrs = FileAttributes {
            name: "x".to_string(),
            once: true,
            ..FileAttributes::default()
        };
        let err = attrs.source_name().unwrap_err();
        assert!(err.to_string().contains("once"), "unexpected error: {err}");
    }

    #[test]
    fn executable_symlink_is_inconsistent() {
        let attrs = FileAttributes {
            name: "x".to_string(),
            file_type: SourceFileType::Symlink,
            executable: true,
            ..FileAttributes::default()
        };
        assert!(attrs.source_name().is_err());
    }
}
