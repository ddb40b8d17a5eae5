//! Verify command implementation.
use anyhow::Result;

use crate::cli::{GlobalOpts, TargetOpts};
use crate::error::ExitFailure;
use crate::logging::Logger;
use crate::state::ApplyOptions;
use crate::system::{CanarySystem, DryRunSystem};

use super::{CommandSetup, StateMode};

/// Run the verify command: succeed only if applying would change nothing.
///
/// # Errors
///
/// Returns [`ExitFailure`] if any mutation would be made, or an error if
/// reading the source state or the destination fails.
pub fn run(global: &GlobalOpts, opts: &TargetOpts, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    let real = setup.real_system(StateMode::ReadOnly)?;
    let state = setup.source_state(&real)?;
    let names = super::target_names(&state, &setup.dest_dir, &opts.targets, opts.recursive)?;

    let system = CanarySystem::new(DryRunSystem::new(&real));
    let options = ApplyOptions {
        include: opts.include,
    };
    super::apply_targets(&state, &system, &setup.dest_dir, &names, &options)?;
    if system.mutated() {
        for mutation in system.mutations() {
            log.debug(&mutation);
        }
        return Err(ExitFailure.into());
    }
    Ok(())
}
