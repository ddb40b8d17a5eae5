//! Dump command implementation.
use std::path::Path;

use anyhow::{Context as _, Result};

use crate::cli::{GlobalOpts, TargetOpts};
use crate::logging::Logger;
use crate::state::ApplyOptions;
use crate::system::DataSystem;

use super::{CommandSetup, StateMode};

/// Run the dump command: write the target state as structured data in the
/// selected format.
///
/// # Errors
///
/// Returns an error if the format is unknown, or reading the source state
/// or marshalling fails.
pub fn run(global: &GlobalOpts, opts: &TargetOpts, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    let format = setup.output_format()?;
    let real = setup.real_system(StateMode::ReadOnly)?;
    let state = setup.source_state(&real)?;
    let names = super::target_names(&state, &setup.dest_dir, &opts.targets, opts.recursive)?;

    let system = DataSystem::new();
    let options = ApplyOptions {
        include: opts.include,
    };
    super::apply_targets(&state, &system, Path::new(""), &names, &options)?;
    let value = system.to_value().context("Failed to collect target state")?;
    super::write_output(global, &format.marshal(&value)?)
}
