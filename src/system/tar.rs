//! Streams the target state into a tar archive.
use std::cell::RefCell;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::{FileInfo, NullSystem, System};

/// Ownership and timestamp stamped on every archive entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderTemplate {
    /// Owner user id.
    pub uid: u64,
    /// Owner group id.
    pub gid: u64,
    /// Owner user name.
    pub uname: String,
    /// Owner group name.
    pub gname: String,
    /// Modification time in seconds since the epoch.
    pub mtime: u64,
}

impl HeaderTemplate {
    /// A template for the current user and time. Lookup failures leave the
    /// zero values in place.
    #[must_use]
    pub fn current() -> Self {
        let uname = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_default();
        let (uid, gid) = owner_ids();
        Self {
            uid,
            gid,
            gname: uname.clone(),
            uname,
            mtime: u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default(),
        }
    }

    fn header(&self, entry_type: tar::EntryType, mode: u32, size: u64) -> io::Result<tar::Header> {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(entry_type);
        header.set_mode(mode);
        header.set_size(size);
        header.set_uid(self.uid);
        header.set_gid(self.gid);
        header.set_username(&self.uname)?;
        header.set_groupname(&self.gname)?;
        header.set_mtime(self.mtime);
        Ok(header)
    }
}

#[cfg(unix)]
fn owner_ids() -> (u64, u64) {
    use std::os::unix::fs::MetadataExt as _;
    std::fs::metadata(crate::platform::home_dir())
        .map(|m| (u64::from(m.uid()), u64::from(m.gid())))
        .unwrap_or_default()
}

#[cfg(not(unix))]
const fn owner_ids() -> (u64, u64) {
    (0, 0)
}

/// A terminal sink that appends a tar record for every directory, file and
/// symlink written. Reads behave like an empty destination; scripts and
/// other mutations are ignored.
pub struct TarSystem<W: Write> {
    builder: RefCell<tar::Builder<W>>,
    template: HeaderTemplate,
}

impl<W: Write> std::fmt::Debug for TarSystem<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TarSystem")
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

impl<W: Write> TarSystem<W> {
    /// Create a system writing the archive to `writer`.
    pub fn new(writer: W, template: HeaderTemplate) -> Self {
        Self {
            builder: RefCell::new(tar::Builder::new(writer)),
            template,
        }
    }

    /// Finish the archive and return the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the trailer cannot be written.
    pub fn close(self) -> io::Result<W> {
        self.builder.into_inner().into_inner()
    }
}

impl<W: Write> System for TarSystem<W> {
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
        let mut header = self.template.header(tar::EntryType::Directory, perm, 0)?;
        let name = format!("{}/", path.display());
        self.builder
            .borrow_mut()
            .append_data(&mut header, name, io::empty())
    }

    fn write_file(&self, path: &Path, data: &[u8], perm: u32) -> io::Result<()> {
        let size = u64::try_from(data.len()).unwrap_or(u64::MAX);
        let mut header = self.template.header(tar::EntryType::Regular, perm, size)?;
        self.builder.borrow_mut().append_data(&mut header, path, data)
    }

    fn write_symlink(&self, oldname: &Path, newname: &Path) -> io::Result<()> {
        let mut header = self.template.header(tar::EntryType::Symlink, 0o777, 0)?;
        self.builder
            .borrow_mut()
            .append_link(&mut header, newname, oldname)
    }

    fn chmod(&self, _path: &Path, _perm: u32) -> io::Result<()> {
        Ok(())
    }

    fn rename(&self, _oldpath: &Path, _newpath: &Path) -> io::Result<()> {
        Ok(())
    }

    fn remove_all(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }

    fn run_script(&self, _name: &str, _body: &[u8]) -> io::Result<()> {
        Ok(())
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
