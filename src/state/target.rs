//! Desired state of a destination path and the idempotent reconciler.
use std::io;
use std::path::Path;

use sha2::{Digest as _, Sha256};

use super::dest::DestStateEntry;
use crate::persistent::SCRIPT_BUCKET;
use crate::system::System;

/// Permission bits are only compared where the platform has them.
pub const POSIX_FILE_MODES: bool = cfg!(unix);

/// The desired state of one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetStateEntry {
    /// The target must not exist.
    Absent,
    /// A directory.
    Dir {
        /// Permission bits.
        perm: u32,
        /// Untracked children are removed.
        exact: bool,
    },
    /// A regular file.
    File {
        /// Contents to write.
        contents: Vec<u8>,
        /// Permission bits.
        perm: u32,
    },
    /// A script to run.
    Script {
        /// Target name of the script.
        name: String,
        /// Script body.
        contents: Vec<u8>,
        /// Run at most once per distinct body.
        once: bool,
    },
    /// A symlink.
    Symlink {
        /// Path the link points at.
        linkname: String,
    },
}

/// SHA-256 of `data`.
#[must_use]
pub fn sha256(data: &[u8]) -> Vec<u8> {
    Sha256::digest(data).to_vec()
}

impl TargetStateEntry {
    /// Bring `path` from `dest` to this state through `system`, issuing
    /// only the mutations needed. Applying twice issues nothing the second
    /// time.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by the system.
    pub fn apply(&self, system: &dyn System, path: &Path, dest: &DestStateEntry) -> io::Result<()> {
        match self {
            Self::Absent => {
                if dest.exists() {
                    system.remove_all(path)?;
                }
                Ok(())
            }
            Self::Dir { perm, .. } => match dest {
                DestStateEntry::Dir { perm: current } => {
                    if POSIX_FILE_MODES && current != perm {
                        system.chmod(path, *perm)?;
                    }
                    Ok(())
                }
                DestStateEntry::Absent => system.mkdir(path, *perm),
                _ => {
                    system.remove_all(path)?;
                    system.mkdir(path, *perm)
                }
            },
            Self::File { contents, perm } => match dest {
                DestStateEntry::File {
                    perm: current_perm,
                    contents: current,
                } => {
                    let perm_differs = POSIX_FILE_MODES && current_perm != perm;
                    if sha256(current) == sha256(contents) {
                        if perm_differs {
                            system.chmod(path, *perm)?;
                        }
                        return Ok(());
                    }
                    system.write_file(path, contents, *perm)
                }
                DestStateEntry::Absent => system.write_file(path, contents, *perm),
                _ => {
                    system.remove_all(path)?;
                    system.write_file(path, contents, *perm)
                }
            },
            Self::Symlink { linkname } => {
                if let DestStateEntry::Symlink { linkname: current } = dest {
                    if current.as_os_str() == linkname.as_str() {
                        return Ok(());
                    }
                }
                if dest.exists() {
                    system.remove_all(path)?;
                }
                system.write_symlink(Path::new(linkname), path)
            }
            Self::Script {
                name,
                contents,
                once,
            } => apply_script(system, name, contents, *once),
        }
    }
}

fn apply_script(system: &dyn System, name: &str, body: &[u8], once: bool) -> io::Result<()> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(());
    }
    let hash = sha256(body);
    if once && system.get(SCRIPT_BUCKET, name.as_bytes())?.as_deref() == Some(hash.as_slice()) {
        tracing::debug!("{name}: already run");
        return Ok(());
    }
    system.run_script(name, body)?;
    if once {
        system.set(SCRIPT_BUCKET, name.as_bytes(), &hash)?;
    }
    Ok(())
}
