//! Refuses every mutation.
use std::io;
use std::path::{Path, PathBuf};

use super::{FileInfo, System, forward_read_methods, permission_denied};

/// Reads pass through; every mutating call fails with `PermissionDenied`.
#[derive(Debug)]
pub struct ReadOnlySystem<S> {
    inner: S,
}

impl<S: System> ReadOnlySystem<S> {
    /// Wrap `inner`.
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S: System> System for ReadOnlySystem<S> {
    forward_read_methods!(inner);

    fn mkdir(&self, path: &Path, _perm: u32) -> io::Result<()> {
        Err(permission_denied("mkdir", path))
    }

    fn write_file(&self, path: &Path, _data: &[u8], _perm: u32) -> io::Result<()> {
        Err(permission_denied("write", path))
    }

    fn write_symlink(&self, _oldname: &Path, newname: &Path) -> io::Result<()> {
        Err(permission_denied("symlink", newname))
    }

    fn chmod(&self, path: &Path, _perm: u32) -> io::Result<()> {
        Err(permission_denied("chmod", path))
    }

    fn rename(&self, oldpath: &Path, _newpath: &Path) -> io::Result<()> {
        Err(permission_denied("rename", oldpath))
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        Err(permission_denied("remove", path))
    }

    fn run_script(&self, name: &str, _body: &[u8]) -> io::Result<()> {
        Err(permission_denied("run", Path::new(name)))
    }

    fn get(&self, bucket: &str, key: &[u8]) -> io::Result<Option<Vec<u8>>> {
        self.inner.get(bucket, key)
    }

    fn set(&self, bucket: &str, _key: &[u8], _value: &[u8]) -> io::Result<()> {
        Err(permission_denied("set", Path::new(bucket)))
    }

    fn delete(&self, bucket: &str, _key: &[u8]) -> io::Result<()> {
        Err(permission_denied("delete", Path::new(bucket)))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::persistent::MemoryPersistentState;
    use crate::system::RealSystem;

    #[test]
    fn mutations_are_refused_and_nothing_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        let s = ReadOnlySystem::new(RealSystem::new(Box::new(MemoryPersistentState::new())));
        let err = s.write_file(&path, b"x", 0o644).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert_eq!(
            s.mkdir(&path, 0o755).unwrap_err().kind(),
            io::ErrorKind::PermissionDenied
        );
        assert_eq!(
            s.run_script("x", b"").unwrap_err().kind(),
            io::ErrorKind::PermissionDenied
        );
        assert!(!path.exists());
    }

    #[test]
    fn reads_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f"), "x").unwrap();
        let s = ReadOnlySystem::new(RealSystem::new(Box::new(MemoryPersistentState::new())));
        assert_eq!(s.read_file(&dir.path().join("f")).unwrap(), b"x");
    }
}
