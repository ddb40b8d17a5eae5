//! Mutation detector.
use std::cell::RefCell;
use std::io;
use std::path::{Path, PathBuf};

use super::{FileInfo, System, forward_read_methods};

/// Forwards every call to the inner system and records each mutating call
/// as `"<method> <primary argument>"`, in call order.
#[derive(Debug)]
pub struct CanarySystem<S> {
    inner: S,
    mutations: RefCell<Vec<String>>,
}

impl<S: System> CanarySystem<S> {
    /// Wrap `inner`.
    pub const fn new(inner: S) -> Self {
        Self {
            inner,
            mutations: RefCell::new(Vec::new()),
        }
    }

    /// Return `true` if any mutating method has been called.
    pub fn mutated(&self) -> bool {
        !self.mutations.borrow().is_empty()
    }

    /// The recorded mutations, oldest first.
    pub fn mutations(&self) -> Vec<String> {
        self.mutations.borrow().clone()
    }

    fn record(&self, method: &str, arg: impl std::fmt::Display) {
        self.mutations.borrow_mut().push(format!("{method} {arg}"));
    }
}

impl<S: System> System for CanarySystem<S> {
    forward_read_methods!(inner);

    fn mkdir(&self, path: &Path, perm: u32) -> io::Result<()> {
        self.record("mkdir", path.display());
        self.inner.mkdir(path, perm)
    }

    fn write_file(&self, path: &Path, data: &[u8], perm: u32) -> io::Result<()> {
        self.record("write_file", path.display());
        self.inner.write_file(path, data, perm)
    }

    fn write_symlink(&self, oldname: &Path, newname: &Path) -> io::Result<()> {
        self.record("write_symlink", newname.display());
        self.inner.write_symlink(oldname, newname)
    }

    fn chmod(&self, path: &Path, perm: u32) -> io::Result<()> {
        self.record("chmod", path.display());
        self.inner.chmod(path, perm)
    }

    fn rename(&self, oldpath: &Path, newpath: &Path) -> io::Result<()> {
        self.record("rename", oldpath.display());
        self.inner.rename(oldpath, newpath)
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        self.record("remove_all", path.display());
        self.inner.remove_all(path)
    }

    fn run_script(&self, name: &str, body: &[u8]) -> io::Result<()> {
        self.record("run_script", name);
        self.inner.run_script(name, body)
    }

    fn get(&self, bucket: &str, key: &[u8]) -> io::Result<Option<Vec<u8>>> {
        self.inner.get(bucket, key)
    }

    fn set(&self, bucket: &str, key: &[u8], value: &[u8]) -> io::Result<()> {
        self.record("set", format!("{bucket}/{}", String::from_utf8_lossy(key)));
        self.inner.set(bucket, key, value)
    }

    fn delete(&self, bucket: &str, key: &[u8]) -> io::Result<()> {
        self.record(
            "delete",
            format!("{bucket}/{}", String::from_utf8_lossy(key)),
        );
        self.inner.delete(bucket, key)
    }
}
