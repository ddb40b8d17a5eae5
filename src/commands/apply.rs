//! Apply command implementation.
use anyhow::Result;

use crate::cli::{GlobalOpts, TargetOpts};
use crate::logging::Logger;
use crate::state::ApplyOptions;
use crate::system::{DebugSystem, DryRunSystem, System};

use super::{CommandSetup, StateMode};

/// Run the apply command.
///
/// With `--dry-run` mutations are logged instead of performed and the
/// persistent state is opened read-only. With `--remove` (or `remove` in
/// the configuration) `.chezmoiremove` targets are deleted afterwards.
///
/// # Errors
///
/// Returns an error if configuration loading, reading the source state, or
/// applying any target fails.
pub fn run(global: &GlobalOpts, opts: &TargetOpts, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    let mode = if global.dry_run {
        StateMode::ReadOnly
    } else {
        StateMode::ReadWrite
    };
    let real = setup.real_system(mode)?;

    log.stage("Reading source state");
    let state = setup.source_state(&real)?;
    let names = super::target_names(&state, &setup.dest_dir, &opts.targets, opts.recursive)?;
    log.info(&format!("{} targets", names.len()));

    let mut system: &dyn System = &real;
    let dry_run_system;
    if global.dry_run {
        dry_run_system = DryRunSystem::new(system);
        system = &dry_run_system;
    }
    let debug_system;
    if global.debug {
        debug_system = DebugSystem::new(system);
        system = &debug_system;
    }

    log.stage("Applying");
    let options = ApplyOptions {
        include: opts.include,
    };
    super::apply_targets(&state, system, &setup.dest_dir, &names, &options)?;

    if setup.config.remove {
        log.stage("Removing");
        state.remove(system, &setup.dest_dir)?;
    }
    Ok(())
}
