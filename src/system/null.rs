//! A terminal sink with nothing in it.
use std::io;
use std::path::{Path, PathBuf};

use super::{FileInfo, System};

/// Reads find nothing, writes are discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSystem;

fn not_found(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, path.display().to_string())
}

impl System for NullSystem {
    fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        Err(not_found(path))
    }

    fn lstat(&self, path: &Path) -> io::Result<FileInfo> {
        Err(not_found(path))
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        Err(not_found(path))
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<FileInfo>> {
        Err(not_found(path))
    }

    fn readlink(&self, path: &Path) -> io::Result<PathBuf> {
        Err(not_found(path))
    }

    fn glob(&self, _pattern: &str) -> io::Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }

    fn mkdir(&self, _path: &Path, _perm: u32) -> io::Result<()> {
        Ok(())
    }

    fn write_file(&self, _path: &Path, _data: &[u8], _perm: u32) -> io::Result<()> {
        Ok(())
    }

    fn write_symlink(&self, _oldname: &Path, _newname: &Path) -> io::Result<()> {
        Ok(())
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
