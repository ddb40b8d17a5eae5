//! The execution surface target states are applied through.
//!
//! [`System`] is one capability interface covering destination reads,
//! destination mutations, script execution, and the persistent key/value
//! store. Variants either act on something real ([`RealSystem`]), are
//! terminal sinks ([`NullSystem`], [`TarSystem`], [`DataSystem`]), or wrap
//! an inner system and override only the calls they change
//! ([`ReadOnlySystem`], [`DryRunSystem`], [`DebugSystem`], [`CanarySystem`],
//! [`GitDiffSystem`]).
//!
//! All methods take `&self`; variants that record calls use interior
//! mutability. `NotFound` from a read means "absent", `PermissionDenied`
//! means a mutation was refused.
use std::io;
use std::path::{Path, PathBuf};

mod canary;
mod data;
mod debug;
mod dry_run;
mod git_diff;
mod null;
mod read_only;
mod real;
mod tar;

pub use canary::CanarySystem;
pub use data::{DataEntry, DataSystem};
pub use debug::DebugSystem;
pub use dry_run::DryRunSystem;
pub use git_diff::GitDiffSystem;
pub use null::NullSystem;
pub use read_only::ReadOnlySystem;
pub use real::RealSystem;
pub use tar::{HeaderTemplate, TarSystem};

/// Kind of a filesystem object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// A directory.
    Dir,
    /// A regular file.
    File,
    /// A symlink.
    Symlink,
    /// Anything else.
    Other,
}

/// Metadata returned by [`System::stat`] and [`System::lstat`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Final path component.
    pub name: String,
    /// Kind of object.
    pub kind: FileKind,
    /// Permission and type bits as reported by the platform.
    pub mode: u32,
    /// Size in bytes.
    pub len: u64,
}

impl FileInfo {
    /// Permission bits only.
    #[must_use]
    pub const fn perm(&self) -> u32 {
        self.mode & 0o777
    }
}

/// Reading and mutating a destination-like target.
pub trait System {
    /// Metadata for `path`, following symlinks.
    ///
    /// # Errors
    ///
    /// `NotFound` if nothing exists at `path`.
    fn stat(&self, path: &Path) -> io::Result<FileInfo>;

    /// Metadata for `path`, not following symlinks.
    ///
    /// # Errors
    ///
    /// `NotFound` if nothing exists at `path`.
    fn lstat(&self, path: &Path) -> io::Result<FileInfo>;

    /// Contents of the file at `path`.
    ///
    /// # Errors
    ///
    /// Any I/O error, including `NotFound`.
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Entries of the directory at `path`, sorted by name.
    ///
    /// # Errors
    ///
    /// Any I/O error, including `NotFound`.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<FileInfo>>;

    /// Target of the symlink at `path`.
    ///
    /// # Errors
    ///
    /// Any I/O error, including `NotFound`.
    fn readlink(&self, path: &Path) -> io::Result<PathBuf>;

    /// Paths matching `pattern`, sorted.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if the pattern is malformed.
    fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>>;

    /// Create the directory `path` with permissions `perm`.
    ///
    /// # Errors
    ///
    /// Any I/O error.
    fn mkdir(&self, path: &Path, perm: u32) -> io::Result<()>;

    /// Write `data` to `path` with permissions `perm`, replacing any file.
    ///
    /// # Errors
    ///
    /// Any I/O error.
    fn write_file(&self, path: &Path, data: &[u8], perm: u32) -> io::Result<()>;

    /// Create a symlink at `newname` pointing to `oldname`.
    ///
    /// # Errors
    ///
    /// Any I/O error.
    fn write_symlink(&self, oldname: &Path, newname: &Path) -> io::Result<()>;

    /// Change the permissions of `path`.
    ///
    /// # Errors
    ///
    /// Any I/O error.
    fn chmod(&self, path: &Path, perm: u32) -> io::Result<()>;

    /// Rename `oldpath` to `newpath`.
    ///
    /// # Errors
    ///
    /// Any I/O error.
    fn rename(&self, oldpath: &Path, newpath: &Path) -> io::Result<()>;

    /// Remove `path` and everything below it. Missing paths are not an error.
    ///
    /// # Errors
    ///
    /// Any I/O error other than `NotFound`.
    fn remove_all(&self, path: &Path) -> io::Result<()>;

    /// Run the script `body`. `name` is the script's target name.
    ///
    /// # Errors
    ///
    /// Any I/O error, or the script failing.
    fn run_script(&self, name: &str, body: &[u8]) -> io::Result<()>;

    /// Value stored under `bucket`/`key` in the persistent store.
    ///
    /// # Errors
    ///
    /// Any error reading the store.
    fn get(&self, bucket: &str, key: &[u8]) -> io::Result<Option<Vec<u8>>>;

    /// Store `value` under `bucket`/`key`.
    ///
    /// # Errors
    ///
    /// Any error writing the store.
    fn set(&self, bucket: &str, key: &[u8], value: &[u8]) -> io::Result<()>;

    /// Remove `bucket`/`key`.
    ///
    /// # Errors
    ///
    /// Any error writing the store.
    fn delete(&self, bucket: &str, key: &[u8]) -> io::Result<()>;
}

/// Implement the read methods of [`System`] by delegating to `self.$inner`.
///
/// The calling module must import `io`, `Path`, `PathBuf` and `FileInfo`.
macro_rules! forward_read_methods {
    ($inner:ident) => {
        fn stat(&self, path: &Path) -> io::Result<FileInfo> {
            self.$inner.stat(path)
        }

        fn lstat(&self, path: &Path) -> io::Result<FileInfo> {
            self.$inner.lstat(path)
        }

        fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
            self.$inner.read_file(path)
        }

        fn read_dir(&self, path: &Path) -> io::Result<Vec<FileInfo>> {
            self.$inner.read_dir(path)
        }

        fn readlink(&self, path: &Path) -> io::Result<PathBuf> {
            self.$inner.readlink(path)
        }

        fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
            self.$inner.glob(pattern)
        }
    };
}
pub(crate) use forward_read_methods;

/// The error every refused mutation returns.
pub(crate) fn permission_denied(op: &str, what: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::PermissionDenied,
        format!("{op} {}: read-only system", what.display()),
    )
}

impl<S: System + ?Sized> System for &S {
    fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        (**self).stat(path)
    }

    fn lstat(&self, path: &Path) -> io::Result<FileInfo> {
        (**self).lstat(path)
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        (**self).read_file(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<FileInfo>> {
        (**self).read_dir(path)
    }

    fn readlink(&self, path: &Path) -> io::Result<PathBuf> {
        (**self).readlink(path)
    }

    fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
        (**self).glob(pattern)
    }

    fn mkdir(&self, path: &Path, perm: u32) -> io::Result<()> {
        (**self).mkdir(path, perm)
    }

    fn write_file(&self, path: &Path, data: &[u8], perm: u32) -> io::Result<()> {
        (**self).write_file(path, data, perm)
    }

    fn write_symlink(&self, oldname: &Path, newname: &Path) -> io::Result<()> {
        (**self).write_symlink(oldname, newname)
    }

    fn chmod(&self, path: &Path, perm: u32) -> io::Result<()> {
        (**self).chmod(path, perm)
    }

    fn rename(&self, oldpath: &Path, newpath: &Path) -> io::Result<()> {
        (**self).rename(oldpath, newpath)
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        (**self).remove_all(path)
    }

    fn run_script(&self, name: &str, body: &[u8]) -> io::Result<()> {
        (**self).run_script(name, body)
    }

    fn get(&self, bucket: &str, key: &[u8]) -> io::Result<Option<Vec<u8>>> {
        (**self).get(bucket, key)
    }

    fn set(&self, bucket: &str, key: &[u8], value: &[u8]) -> io::Result<()> {
        (**self).set(bucket, key, value)
    }

    fn delete(&self, bucket: &str, key: &[u8]) -> io::Result<()> {
        (**self).delete(bucket, key)
    }
}
