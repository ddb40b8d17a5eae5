//! Data command implementation.
use anyhow::Result;

use crate::cli::GlobalOpts;
use crate::logging::Logger;

use super::{CommandSetup, StateMode};

/// Run the data command: print the merged template data.
///
/// # Errors
///
/// Returns an error if the format is unknown or reading the source state
/// fails.
pub fn run(global: &GlobalOpts, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    let format = setup.output_format()?;
    let real = setup.real_system(StateMode::ReadOnly)?;
    let state = setup.source_state(&real)?;
    super::write_output(global, &format.marshal(state.template_data())?)
}
