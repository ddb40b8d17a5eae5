//! Collects the target state as structured records for `dump`.
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{FileInfo, NullSystem, System, permission_denied};

/// One collected record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DataEntry {
    /// A directory.
    Dir {
        /// Target name.
        name: String,
        /// Permission bits.
        perm: u32,
    },
    /// A regular file.
    File {
        /// Target name.
        name: String,
        /// Contents, lossily decoded as UTF-8.
        contents: String,
        /// Permission bits.
        perm: u32,
    },
    /// A script.
    Script {
        /// Target name.
        name: String,
        /// Script body, lossily decoded as UTF-8.
        contents: String,
    },
    /// A symlink.
    Symlink {
        /// Target name.
        name: String,
        /// Path the link points at.
        linkname: String,
    },
}

/// A terminal sink that records every write keyed by path. Writing the same
/// path twice fails with `AlreadyExists`; `chmod` and `remove_all` are
/// refused.
#[derive(Debug, Default)]
pub struct DataSystem {
    data: RefCell<BTreeMap<String, DataEntry>>,
}

impl DataSystem {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The collected records, keyed by path.
    pub fn data(&self) -> BTreeMap<String, DataEntry> {
        self.data.borrow().clone()
    }

    /// The collected records as a generic value ready for a
    /// [`Format`](crate::format::Format).
    ///
    /// # Errors
    ///
    /// Returns an error if a record cannot be converted.
    pub fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(&*self.data.borrow())
    }

    fn insert(&self, key: String, entry: DataEntry) -> io::Result<()> {
        let mut data = self.data.borrow_mut();
        if data.contains_key(&key) {
            return Err(io::Error::new(io::ErrorKind::AlreadyExists, key));
        }
        data.insert(key, entry);
        Ok(())
    }
}

fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl System for DataSystem {
    fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        NullSystem.stat(path)
    }

    fn lstat(&self, path: &Path) -> io::Result<FileInfo> {
        NullSystem.lstat(path)
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        NullSystem.read_file(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<FileInfo>> {
        NullSystem.read_dir(path)
    }

    fn readlink(&self, path: &Path) -> io::Result<PathBuf> {
        NullSystem.readlink(path)
    }

    fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
        NullSystem.glob(pattern)
    }

    fn mkdir(&self, path: &Path, perm: u32) -> io::Result<()> {
        self.insert(
            key(path),
            DataEntry::Dir {
                name: key(path),
                perm,
            },
        )
    }

    fn write_file(&self, path: &Path, data: &[u8], perm: u32) -> io::Result<()> {
        self.insert(
            key(path),
            DataEntry::File {
                name: key(path),
                contents: String::from_utf8_lossy(data).into_owned(),
                perm,
            },
        )
    }

    fn write_symlink(&self, oldname: &Path, newname: &Path) -> io::Result<()> {
        self.insert(
            key(newname),
            DataEntry::Symlink {
                name: key(newname),
                linkname: key(oldname),
            },
        )
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

    fn run_script(&self, name: &str, body: &[u8]) -> io::Result<()> {
        self.insert(
            name.to_string(),
            DataEntry::Script {
                name: name.to_string(),
                contents: String::from_utf8_lossy(body).into_owned(),
            },
        )
    }

    fn get(&self, _bucket: &str, _key: &[u8]) -> io::Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn set(&self, _bucket: &str, _key: &[u8], _value: &[u8]) -> io::Result<()> {
        Ok(())
    }

    fn delete(&self, _bucket: &str, _key: &[u8]) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn records_are_keyed_and_typed() {
        let s = DataSystem::new();
        s.mkdir(Path::new(".ssh"), 0o700).unwrap();
        s.write_file(Path::new(".bashrc"), b"X", 0o644).unwrap();
        s.write_symlink(Path::new("/etc/motd"), Path::new("motd"))
            .unwrap();
        s.run_script("install.sh", b"echo hi").unwrap();
        assert_eq!(
            s.to_value().unwrap(),
            json!({
                ".bashrc": {"type": "file", "name": ".bashrc", "contents": "X", "perm": 0o644},
                ".ssh": {"type": "dir", "name": ".ssh", "perm": 0o700},
                "install.sh": {"type": "script", "name": "install.sh", "contents": "echo hi"},
                "motd": {"type": "symlink", "name": "motd", "linkname": "/etc/motd"},
            })
        );
    }

    #[test]
    fn duplicate_key_is_already_exists() {
        let s = DataSystem::new();
        s.write_file(Path::new("a"), b"", 0o644).unwrap();
        let err = s.mkdir(Path::new("a"), 0o755).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(s.data().len(), 1);
    }

    #[test]
    fn chmod_and_remove_are_refused() {
        let s = DataSystem::new();
        assert_eq!(
            s.chmod(Path::new("a"), 0o600).unwrap_err().kind(),
            io::ErrorKind::PermissionDenied
        );
        assert_eq!(
            s.remove_all(Path::new("a")).unwrap_err().kind(),
            io::ErrorKind::PermissionDenied
        );
    }
}
