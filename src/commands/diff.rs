//! Diff command implementation.
use anyhow::Result;

use crate::cli::{GlobalOpts, TargetOpts};
use crate::logging::Logger;
use crate::state::ApplyOptions;
use crate::system::{GitDiffSystem, ReadOnlySystem};

use super::{CommandSetup, StateMode};

/// Run the diff command: print what `apply` would change as a git-style
/// diff without changing anything.
///
/// # Errors
///
/// Returns an error if reading the source state or the destination fails.
pub fn run(global: &GlobalOpts, opts: &TargetOpts, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    let real = setup.real_system(StateMode::ReadOnly)?;
    let state = setup.source_state(&real)?;
    let names = super::target_names(&state, &setup.dest_dir, &opts.targets, opts.recursive)?;

    let system = GitDiffSystem::new(ReadOnlySystem::new(&real), setup.dest_dir.clone());
    let options = ApplyOptions {
        include: opts.include,
    };
    super::apply_targets(&state, &system, &setup.dest_dir, &names, &options)?;
    if setup.config.remove {
        state.remove(&system, &setup.dest_dir)?;
    }
    super::write_output(global, system.into_output().as_bytes())
}
