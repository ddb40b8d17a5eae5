//! Renders mutations as a git-style unified diff.
use std::cell::RefCell;
use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

use similar::TextDiff;

use super::{FileInfo, FileKind, System, forward_read_methods};

const MODE_DIR: u32 = 0o040_000;
const MODE_FILE: u32 = 0o100_000;
const MODE_SYMLINK: u32 = 0o120_000;

/// Intercepts mutations and appends a diff between what the inner system
/// currently holds and what the mutation would produce. Nothing is applied.
#[derive(Debug)]
pub struct GitDiffSystem<S> {
    inner: S,
    dest_dir: PathBuf,
    output: RefCell<String>,
}

impl<S: System> GitDiffSystem<S> {
    /// Wrap `inner`. Paths in the output are shown relative to `dest_dir`.
    pub const fn new(inner: S, dest_dir: PathBuf) -> Self {
        Self {
            inner,
            dest_dir,
            output: RefCell::new(String::new()),
        }
    }

    /// The diff accumulated so far.
    pub fn output(&self) -> String {
        self.output.borrow().clone()
    }

    /// Consume the system and return the accumulated diff.
    pub fn into_output(self) -> String {
        self.output.into_inner()
    }

    fn rel(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.dest_dir).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Current contents and git mode of `path`, or `None` when absent.
    fn current(&self, path: &Path) -> io::Result<Option<(Vec<u8>, u32)>> {
        let info = match self.inner.lstat(path) {
            Ok(info) => info,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };
        Ok(Some(match info.kind {
            FileKind::Dir => (Vec::new(), MODE_DIR | info.perm()),
            FileKind::Symlink => (
                self.inner
                    .readlink(path)?
                    .to_string_lossy()
                    .into_owned()
                    .into_bytes(),
                MODE_SYMLINK,
            ),
            FileKind::File | FileKind::Other => {
                (self.inner.read_file(path)?, MODE_FILE | info.perm())
            }
        }))
    }

    fn write_diff(
        &self,
        name: &str,
        old: Option<(&[u8], u32)>,
        new: Option<(&[u8], u32)>,
    ) {
        let mut out = self.output.borrow_mut();
        let _ = writeln!(out, "diff --git a/{name} b/{name}");
        match (old, new) {
            (None, Some((_, mode))) => {
                let _ = writeln!(out, "new file mode {mode:06o}");
            }
            (Some((_, mode)), None) => {
                let _ = writeln!(out, "deleted file mode {mode:06o}");
            }
            (Some((_, old_mode)), Some((_, new_mode))) if old_mode != new_mode => {
                let _ = writeln!(out, "old mode {old_mode:06o}");
                let _ = writeln!(out, "new mode {new_mode:06o}");
            }
            _ => {}
        }
        let old_data = old.map_or(&[][..], |(data, _)| data);
        let new_data = new.map_or(&[][..], |(data, _)| data);
        if old_data == new_data {
            return;
        }
        let old_label = if old.is_some() {
            format!("a/{name}")
        } else {
            "/dev/null".to_string()
        };
        let new_label = if new.is_some() {
            format!("b/{name}")
        } else {
            "/dev/null".to_string()
        };
        match (std::str::from_utf8(old_data), std::str::from_utf8(new_data)) {
            (Ok(old_text), Ok(new_text)) => {
                let diff = TextDiff::from_lines(old_text, new_text);
                let _ = write!(
                    out,
                    "{}",
                    diff.unified_diff()
                        .context_radius(3)
                        .header(&old_label, &new_label)
                );
            }
            _ => {
                let _ = writeln!(out, "Binary files {old_label} and {new_label} differ");
            }
        }
    }
}

impl<S: System> System for GitDiffSystem<S> {
    forward_read_methods!(inner);

    fn mkdir(&self, path: &Path, perm: u32) -> io::Result<()> {
        let name = self.rel(path);
        self.write_diff(&name, None, Some((&[], MODE_DIR | perm)));
        Ok(())
    }

    fn write_file(&self, path: &Path, data: &[u8], perm: u32) -> io::Result<()> {
        let current = self.current(path)?;
        let name = self.rel(path);
        self.write_diff(
            &name,
            current.as_ref().map(|(d, m)| (d.as_slice(), *m)),
            Some((data, MODE_FILE | perm)),
        );
        Ok(())
    }

    fn write_symlink(&self, oldname: &Path, newname: &Path) -> io::Result<()> {
        let current = self.current(newname)?;
        let name = self.rel(newname);
        let target = oldname.to_string_lossy();
        self.write_diff(
            &name,
            current.as_ref().map(|(d, m)| (d.as_slice(), *m)),
            Some((target.as_bytes(), MODE_SYMLINK)),
        );
        Ok(())
    }

    fn chmod(&self, path: &Path, perm: u32) -> io::Result<()> {
        let info = self.inner.lstat(path)?;
        let kind_bits = if info.kind == FileKind::Dir {
            MODE_DIR
        } else {
            MODE_FILE
        };
        let mut out = self.output.borrow_mut();
        let name = self.rel(path);
        let _ = writeln!(out, "diff --git a/{name} b/{name}");
        let _ = writeln!(out, "old mode {:06o}", kind_bits | info.perm());
        let _ = writeln!(out, "new mode {:06o}", kind_bits | perm);
        Ok(())
    }

    fn rename(&self, oldpath: &Path, newpath: &Path) -> io::Result<()> {
        let mut out = self.output.borrow_mut();
        let (old, new) = (self.rel(oldpath), self.rel(newpath));
        let _ = writeln!(out, "diff --git a/{old} b/{new}");
        let _ = writeln!(out, "rename from {old}");
        let _ = writeln!(out, "rename to {new}");
        Ok(())
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        if let Some((data, mode)) = self.current(path)? {
            let name = self.rel(path);
            self.write_diff(&name, Some((&data, mode)), None);
        }
        Ok(())
    }

    fn run_script(&self, name: &str, body: &[u8]) -> io::Result<()> {
        self.write_diff(name, None, Some((body, MODE_FILE | 0o755)));
        Ok(())
    }

    fn get(&self, bucket: &str, key: &[u8]) -> io::Result<Option<Vec<u8>>> {
        self.inner.get(bucket, key)
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
    use crate::persistent::MemoryPersistentState;
    use crate::system::{ReadOnlySystem, RealSystem};

    fn system(dest: &Path) -> GitDiffSystem<ReadOnlySystem<RealSystem>> {
        GitDiffSystem::new(
            ReadOnlySystem::new(RealSystem::new(Box::new(MemoryPersistentState::new()))),
            dest.to_path_buf(),
        )
    }

    #[test]
    fn new_file_diff() {
        let dir = tempfile::tempdir().unwrap();
        let s = system(dir.path());
        s.write_file(&dir.path().join(".bashrc"), b"X\n", 0o644)
            .unwrap();
        insta::assert_snapshot!(s.output(), @r"
        diff --git a/.bashrc b/.bashrc
        new file mode 100644
        --- /dev/null
        +++ b/.bashrc
        @@ -0,0 +1 @@
        +X
        ");
        assert!(!dir.path().join(".bashrc").exists());
    }

    #[test]
    fn modified_file_diff() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, "a\nb\n").unwrap();
        let perm = RealSystem::new(Box::new(MemoryPersistentState::new()))
            .lstat(&path)
            .unwrap()
            .perm();
        let s = system(dir.path());
        s.write_file(&path, b"a\nc\n", perm).unwrap();
        insta::assert_snapshot!(s.output(), @r"
        diff --git a/f b/f
        --- a/f
        +++ b/f
        @@ -1,2 +1,2 @@
         a
        -b
        +c
        ");
    }

    #[test]
    fn mkdir_and_script_diffs() {
        let dir = tempfile::tempdir().unwrap();
        let s = system(dir.path());
        s.mkdir(&dir.path().join(".ssh"), 0o700).unwrap();
        s.run_script("install.sh", b"echo hi\n").unwrap();
        insta::assert_snapshot!(s.output(), @r"
        diff --git a/.ssh b/.ssh
        new file mode 040700
        diff --git a/install.sh b/install.sh
        new file mode 100755
        --- /dev/null
        +++ b/install.sh
        @@ -0,0 +1 @@
        +echo hi
        ");
    }

    #[test]
    fn remove_missing_path_prints_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let s = system(dir.path());
        s.remove_all(&dir.path().join("gone")).unwrap();
        assert_eq!(s.output(), "");
    }

    #[test]
    fn binary_contents_are_summarised() {
        let dir = tempfile::tempdir().unwrap();
        let s = system(dir.path());
        s.write_file(&dir.path().join("bin"), &[0xff, 0xfe], 0o644)
            .unwrap();
        assert!(
            s.output()
                .ends_with("Binary files /dev/null and b/bin differ\n")
        );
    }
}
