//! Observed state of a destination path.
use std::io;
use std::path::{Path, PathBuf};

use crate::system::{FileKind, System};

/// What currently exists at a destination path, read with `lstat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestStateEntry {
    /// Nothing exists at the path.
    Absent,
    /// A directory.
    Dir {
        /// Permission bits.
        perm: u32,
    },
    /// A regular file.
    File {
        /// Permission bits.
        perm: u32,
        /// Current contents.
        contents: Vec<u8>,
    },
    /// A symlink.
    Symlink {
        /// Path the link points at.
        linkname: PathBuf,
    },
    /// A device, socket, fifo or similar. Its contents are never read.
    Other {
        /// File mode bits.
        mode: u32,
    },
}

impl DestStateEntry {
    /// Read the state of `path` through `system`.
    ///
    /// # Errors
    ///
    /// Returns any error other than `NotFound` from the system.
    pub fn read(system: &dyn System, path: &Path) -> io::Result<Self> {
        let info = match system.lstat(path) {
            Ok(info) => info,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::Absent),
            Err(err) => return Err(err),
        };
        Ok(match info.kind {
            FileKind::Dir => Self::Dir { perm: info.perm() },
            FileKind::File => Self::File {
                perm: info.perm(),
                contents: system.read_file(path)?,
            },
            FileKind::Symlink => Self::Symlink {
                linkname: system.readlink(path)?,
            },
            FileKind::Other => Self::Other { mode: info.mode },
        })
    }

    /// Return `true` unless the entry is [`DestStateEntry::Absent`].
    #[must_use]
    pub const fn exists(&self) -> bool {
        !matches!(self, Self::Absent)
    }
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
    use crate::system::RealSystem;

    fn real() -> RealSystem {
        RealSystem::new(Box::new(MemoryPersistentState::new()))
    }

    #[test]
    fn missing_path_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let entry = DestStateEntry::read(&real(), &dir.path().join("nope")).unwrap();
        assert_eq!(entry, DestStateEntry::Absent);
        assert!(!entry.exists());
    }

    #[test]
    fn file_contents_are_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, "hello").unwrap();
        match DestStateEntry::read(&real(), &path).unwrap() {
            DestStateEntry::File { contents, .. } => assert_eq!(contents, b"hello"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn directory_is_dir() {
        let dir = tempfile::tempdir().unwrap();
        let entry = DestStateEntry::read(&real(), dir.path()).unwrap();
        assert!(matches!(entry, DestStateEntry::Dir { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_is_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink("missing-target", &link).unwrap();
        assert_eq!(
            DestStateEntry::read(&real(), &link).unwrap(),
            DestStateEntry::Symlink {
                linkname: PathBuf::from("missing-target")
            }
        );
    }
}
