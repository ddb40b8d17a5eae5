//! Archive command implementation.
use std::path::Path;

use anyhow::{Context as _, Result};

use crate::cli::{GlobalOpts, TargetOpts};
use crate::logging::Logger;
use crate::state::ApplyOptions;
use crate::system::{HeaderTemplate, TarSystem};

use super::{CommandSetup, StateMode};

/// Run the archive command: write the target state as a tar archive with
/// paths relative to the destination directory.
///
/// # Errors
///
/// Returns an error if reading the source state or writing the archive
/// fails.
pub fn run(global: &GlobalOpts, opts: &TargetOpts, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    let real = setup.real_system(StateMode::ReadOnly)?;
    let state = setup.source_state(&real)?;
    let names = super::target_names(&state, &setup.dest_dir, &opts.targets, opts.recursive)?;

    let system = TarSystem::new(Vec::new(), HeaderTemplate::current());
    let options = ApplyOptions {
        include: opts.include,
    };
    super::apply_targets(&state, &system, Path::new(""), &names, &options)?;
    let archive = system.close().context("Failed to finish archive")?;
    super::write_output(global, &archive)
}
