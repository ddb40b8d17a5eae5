//! Cat command implementation.
use anyhow::{Result, bail};

use crate::cli::{CatOpts, GlobalOpts};
use crate::logging::Logger;
use crate::state::TargetStateEntry;

use super::{CommandSetup, StateMode};

/// Run the cat command: print the target contents of files and scripts and
/// the target of symlinks.
///
/// # Errors
///
/// Returns an error if a target is not managed, is a directory, or fails
/// to resolve.
pub fn run(global: &GlobalOpts, opts: &CatOpts, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    let real = setup.real_system(StateMode::ReadOnly)?;
    let state = setup.source_state(&real)?;
    let names = super::target_names(&state, &setup.dest_dir, &opts.targets, false)?;
    let mut output = Vec::new();
    for name in &names {
        match state.target_state(name)? {
            TargetStateEntry::File { contents, .. } | TargetStateEntry::Script { contents, .. } => {
                output.extend_from_slice(contents);
            }
            TargetStateEntry::Symlink { linkname } => {
                output.extend_from_slice(linkname.as_bytes());
                output.push(b'\n');
            }
            TargetStateEntry::Dir { .. } | TargetStateEntry::Absent => {
                bail!("{name}: not a file, script, or symlink");
            }
        }
    }
    super::write_output(global, &output)
}
