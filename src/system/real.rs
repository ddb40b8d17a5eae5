//! The live filesystem, process space and persistent store.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{FileInfo, FileKind, System};
use crate::persistent::PersistentState;

/// Performs every call for real.
#[derive(Debug)]
pub struct RealSystem {
    persistent: Box<dyn PersistentState>,
    script_dir: PathBuf,
    work_dir: PathBuf,
}

impl RealSystem {
    /// Create a system backed by `persistent`.
    ///
    /// Scripts are staged in the OS temporary directory and run from the
    /// current directory until [`with_work_dir`](Self::with_work_dir) says
    /// otherwise.
    #[must_use]
    pub fn new(persistent: Box<dyn PersistentState>) -> Self {
        Self {
            persistent,
            script_dir: std::env::temp_dir(),
            work_dir: PathBuf::from("."),
        }
    }

    /// Working directory scripts run in.
    #[must_use]
    pub fn with_work_dir(mut self, dir: PathBuf) -> Self {
        self.work_dir = dir;
        self
    }
}

fn file_info(path: &Path, meta: &fs::Metadata) -> FileInfo {
    let file_type = meta.file_type();
    let kind = if file_type.is_symlink() {
        FileKind::Symlink
    } else if file_type.is_dir() {
        FileKind::Dir
    } else if file_type.is_file() {
        FileKind::File
    } else {
        FileKind::Other
    };
    FileInfo {
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        kind,
        mode: mode_bits(meta, kind),
        len: meta.len(),
    }
}

#[cfg(unix)]
fn mode_bits(meta: &fs::Metadata, _kind: FileKind) -> u32 {
    use std::os::unix::fs::MetadataExt as _;
    meta.mode()
}

#[cfg(not(unix))]
fn mode_bits(meta: &fs::Metadata, kind: FileKind) -> u32 {
    let perm = match kind {
        FileKind::Dir | FileKind::Symlink => 0o777,
        FileKind::File | FileKind::Other => 0o666,
    };
    if meta.permissions().readonly() {
        perm & !0o222
    } else {
        perm
    }
}

#[cfg(unix)]
fn set_perm(path: &Path, perm: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt as _;
    fs::set_permissions(path, fs::Permissions::from_mode(perm))
}

#[cfg(not(unix))]
fn set_perm(_path: &Path, _perm: u32) -> io::Result<()> {
    Ok(())
}

fn store_error(err: anyhow::Error) -> io::Error {
    io::Error::other(format!("{err:#}"))
}

impl System for RealSystem {
    fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        Ok(file_info(path, &fs::metadata(path)?))
    }

    fn lstat(&self, path: &Path) -> io::Result<FileInfo> {
        Ok(file_info(path, &fs::symlink_metadata(path)?))
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<FileInfo>> {
        let mut infos = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            infos.push(file_info(&entry.path(), &entry.metadata()?));
        }
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    fn readlink(&self, path: &Path) -> io::Result<PathBuf> {
        fs::read_link(path)
    }

    fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
        let paths = glob::glob(pattern).map_err(|err| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("{pattern}: {err}"))
        })?;
        let mut matches = Vec::new();
        for path in paths {
            matches.push(path.map_err(io::Error::from)?);
        }
        matches.sort();
        Ok(matches)
    }

    fn mkdir(&self, path: &Path, perm: u32) -> io::Result<()> {
        fs::create_dir(path)?;
        set_perm(path, perm)
    }

    fn write_file(&self, path: &Path, data: &[u8], perm: u32) -> io::Result<()> {
        fs::write(path, data)?;
        set_perm(path, perm)
    }

    fn write_symlink(&self, oldname: &Path, newname: &Path) -> io::Result<()> {
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(oldname, newname)
        }
        #[cfg(windows)]
        {
            std::os::windows::fs::symlink_file(oldname, newname)
        }
        #[cfg(not(any(unix, windows)))]
        {
            let _ = (oldname, newname);
            Err(io::Error::from(io::ErrorKind::Unsupported))
        }
    }

    fn chmod(&self, path: &Path, perm: u32) -> io::Result<()> {
        set_perm(path, perm)
    }

    fn rename(&self, oldpath: &Path, newpath: &Path) -> io::Result<()> {
        fs::rename(oldpath, newpath)
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        let result = match fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
            Ok(_) => fs::remove_file(path),
            Err(err) => Err(err),
        };
        match result {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn run_script(&self, name: &str, body: &[u8]) -> io::Result<()> {
        crate::exec::run_script(&self.script_dir, &self.work_dir, name, body)
    }

    fn get(&self, bucket: &str, key: &[u8]) -> io::Result<Option<Vec<u8>>> {
        self.persistent.get(bucket, key).map_err(store_error)
    }

    fn set(&self, bucket: &str, key: &[u8], value: &[u8]) -> io::Result<()> {
        self.persistent.set(bucket, key, value).map_err(store_error)
    }

    fn delete(&self, bucket: &str, key: &[u8]) -> io::Result<()> {
        self.persistent.delete(bucket, key).map_err(store_error)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::persistent::{MemoryPersistentState, SCRIPT_BUCKET};

    fn system() -> RealSystem {
        RealSystem::new(Box::new(MemoryPersistentState::new()))
    }

    #[test]
    fn lstat_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = system().lstat(&dir.path().join("missing")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    #[cfg(unix)]
    fn write_file_sets_exact_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        let s = system();
        s.write_file(&path, b"x", 0o600).unwrap();
        let info = s.lstat(&path).unwrap();
        assert_eq!(info.kind, FileKind::File);
        assert_eq!(info.perm(), 0o600);
        assert_eq!(s.read_file(&path).unwrap(), b"x");
    }

    #[test]
    #[cfg(unix)]
    fn mkdir_ignores_process_umask() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d");
        let s = system();
        s.mkdir(&path, 0o777).unwrap();
        assert_eq!(s.stat(&path).unwrap().perm(), 0o777);
    }

    #[test]
    #[cfg(unix)]
    fn symlink_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("link");
        let s = system();
        s.write_symlink(Path::new("target"), &link).unwrap();
        assert_eq!(s.lstat(&link).unwrap().kind, FileKind::Symlink);
        assert_eq!(s.readlink(&link).unwrap(), PathBuf::from("target"));
    }

    #[test]
    fn read_dir_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b", "c", "a"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let names: Vec<String> = system()
            .read_dir(dir.path())
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn remove_all_handles_trees_and_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        let tree = dir.path().join("tree");
        fs::create_dir_all(tree.join("sub")).unwrap();
        fs::write(tree.join("sub/file"), "x").unwrap();
        let s = system();
        s.remove_all(&tree).unwrap();
        assert!(!tree.exists());
        s.remove_all(&tree).unwrap();
    }

    #[test]
    fn glob_matches_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.log"), "").unwrap();
        fs::write(dir.path().join("a.log"), "").unwrap();
        fs::write(dir.path().join("c.txt"), "").unwrap();
        let pattern = format!("{}/*.log", dir.path().display());
        let matches = system().glob(&pattern).unwrap();
        assert_eq!(
            matches,
            vec![dir.path().join("a.log"), dir.path().join("b.log")]
        );
    }

    #[test]
    fn persistent_calls_reach_the_store() {
        let s = system();
        s.set(SCRIPT_BUCKET, b"k", b"v").unwrap();
        assert_eq!(s.get(SCRIPT_BUCKET, b"k").unwrap(), Some(b"v".to_vec()));
        s.delete(SCRIPT_BUCKET, b"k").unwrap();
        assert_eq!(s.get(SCRIPT_BUCKET, b"k").unwrap(), None);
    }
}
