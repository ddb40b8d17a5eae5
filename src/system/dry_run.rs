//! Logs mutations instead of performing them.
use std::io;
use std::path::{Path, PathBuf};

use super::{FileInfo, System, forward_read_methods};
use crate::logging::DRY_RUN_TARGET;

/// Reads pass through; mutations are logged on `chezmoi::dry_run` and
/// reported as successful without reaching the inner system.
#[derive(Debug)]
pub struct DryRunSystem<S> {
    inner: S,
}

impl<S: System> DryRunSystem<S> {
    /// Wrap `inner`.
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S: System> System for DryRunSystem<S> {
    forward_read_methods!(inner);

    fn mkdir(&self, path: &Path, perm: u32) -> io::Result<()> {
        tracing::info!(target: DRY_RUN_TARGET, "mkdir {} ({perm:o})", path.display());
        Ok(())
    }

    fn write_file(&self, path: &Path, data: &[u8], perm: u32) -> io::Result<()> {
        tracing::info!(
            target: DRY_RUN_TARGET,
            "write {} ({} bytes, {perm:o})",
            path.display(),
            data.len()
        );
        Ok(())
    }

    fn write_symlink(&self, oldname: &Path, newname: &Path) -> io::Result<()> {
        tracing::info!(
            target: DRY_RUN_TARGET,
            "symlink {} -> {}",
            newname.display(),
            oldname.display()
        );
        Ok(())
    }

    fn chmod(&self, path: &Path, perm: u32) -> io::Result<()> {
        tracing::info!(target: DRY_RUN_TARGET, "chmod {perm:o} {}", path.display());
        Ok(())
    }

    fn rename(&self, oldpath: &Path, newpath: &Path) -> io::Result<()> {
        tracing::info!(
            target: DRY_RUN_TARGET,
            "rename {} -> {}",
            oldpath.display(),
            newpath.display()
        );
        Ok(())
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        tracing::info!(target: DRY_RUN_TARGET, "remove {}", path.display());
        Ok(())
    }

    fn run_script(&self, name: &str, _body: &[u8]) -> io::Result<()> {
        tracing::info!(target: DRY_RUN_TARGET, "run {name}");
        Ok(())
    }

    fn get(&self, bucket: &str, key: &[u8]) -> io::Result<Option<Vec<u8>>> {
        self.inner.get(bucket, key)
    }

    fn set(&self, bucket: &str, key: &[u8], _value: &[u8]) -> io::Result<()> {
        tracing::debug!(
            target: DRY_RUN_TARGET,
            "set {bucket}/{}",
            String::from_utf8_lossy(key)
        );
        Ok(())
    }

    fn delete(&self, bucket: &str, key: &[u8]) -> io::Result<()> {
        tracing::debug!(
            target: DRY_RUN_TARGET,
            "delete {bucket}/{}",
            String::from_utf8_lossy(key)
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::persistent::{MemoryPersistentState, SCRIPT_BUCKET};
    use crate::system::RealSystem;

    fn system() -> DryRunSystem<RealSystem> {
        DryRunSystem::new(RealSystem::new(Box::new(MemoryPersistentState::new())))
    }

    #[test]
    fn mutations_succeed_without_effect() {
        let dir = tempfile::tempdir().unwrap();
        let s = system();
        s.mkdir(&dir.path().join("d"), 0o755).unwrap();
        s.write_file(&dir.path().join("f"), b"x", 0o644).unwrap();
        s.run_script("install.sh", b"#!/bin/sh\nexit 1\n").unwrap();
        s.set(SCRIPT_BUCKET, b"k", b"v").unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(s.get(SCRIPT_BUCKET, b"k").unwrap(), None);
    }

    #[test]
    fn reads_see_the_real_destination() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f"), "x").unwrap();
        assert_eq!(system().read_file(&dir.path().join("f")).unwrap(), b"x");
    }
}
