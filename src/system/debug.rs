//! Traces every call at DEBUG on `chezmoi::system`.
use std::io;
use std::path::{Path, PathBuf};

use super::{FileInfo, System};
use crate::logging::SYSTEM_TARGET;

/// Passes every call through unchanged and logs it with its outcome.
#[derive(Debug)]
pub struct DebugSystem<S> {
    inner: S,
}

impl<S: System> DebugSystem<S> {
    /// Wrap `inner`.
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }
}

fn traced<T>(call: &str, result: io::Result<T>) -> io::Result<T> {
    match &result {
        Ok(_) => tracing::debug!(target: SYSTEM_TARGET, "{call}"),
        Err(err) => tracing::debug!(target: SYSTEM_TARGET, "{call}: {err}"),
    }
    result
}

impl<S: System> System for DebugSystem<S> {
    fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        traced(&format!("stat {}", path.display()), self.inner.stat(path))
    }

    fn lstat(&self, path: &Path) -> io::Result<FileInfo> {
        traced(&format!("lstat {}", path.display()), self.inner.lstat(path))
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        traced(
            &format!("read_file {}", path.display()),
            self.inner.read_file(path),
        )
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<FileInfo>> {
        traced(
            &format!("read_dir {}", path.display()),
            self.inner.read_dir(path),
        )
    }

    fn readlink(&self, path: &Path) -> io::Result<PathBuf> {
        traced(
            &format!("readlink {}", path.display()),
            self.inner.readlink(path),
        )
    }

    fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
        traced(&format!("glob {pattern}"), self.inner.glob(pattern))
    }

    fn mkdir(&self, path: &Path, perm: u32) -> io::Result<()> {
        traced(
            &format!("mkdir {} {perm:o}", path.display()),
            self.inner.mkdir(path, perm),
        )
    }

    fn write_file(&self, path: &Path, data: &[u8], perm: u32) -> io::Result<()> {
        traced(
            &format!(
                "write_file {} {} bytes {perm:o}",
                path.display(),
                data.len()
            ),
            self.inner.write_file(path, data, perm),
        )
    }

    fn write_symlink(&self, oldname: &Path, newname: &Path) -> io::Result<()> {
        traced(
            &format!("write_symlink {} {}", oldname.display(), newname.display()),
            self.inner.write_symlink(oldname, newname),
        )
    }

    fn chmod(&self, path: &Path, perm: u32) -> io::Result<()> {
        traced(
            &format!("chmod {} {perm:o}", path.display()),
            self.inner.chmod(path, perm),
        )
    }

    fn rename(&self, oldpath: &Path, newpath: &Path) -> io::Result<()> {
        traced(
            &format!("rename {} {}", oldpath.display(), newpath.display()),
            self.inner.rename(oldpath, newpath),
        )
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        traced(
            &format!("remove_all {}", path.display()),
            self.inner.remove_all(path),
        )
    }

    fn run_script(&self, name: &str, body: &[u8]) -> io::Result<()> {
        traced(
            &format!("run_script {name}"),
            self.inner.run_script(name, body),
        )
    }

    fn get(&self, bucket: &str, key: &[u8]) -> io::Result<Option<Vec<u8>>> {
        traced(
            &format!("get {bucket} {}", String::from_utf8_lossy(key)),
            self.inner.get(bucket, key),
        )
    }

    fn set(&self, bucket: &str, key: &[u8], value: &[u8]) -> io::Result<()> {
        traced(
            &format!("set {bucket} {}", String::from_utf8_lossy(key)),
            self.inner.set(bucket, key, value),
        )
    }

    fn delete(&self, bucket: &str, key: &[u8]) -> io::Result<()> {
        traced(
            &format!("delete {bucket} {}", String::from_utf8_lossy(key)),
            self.inner.delete(bucket, key),
        )
    }
}
