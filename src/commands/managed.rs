//! Managed command implementation.
use anyhow::Result;

use crate::cli::{GlobalOpts, ManagedOpts};
use crate::logging::Logger;

use super::{CommandSetup, StateMode};

/// Run the managed command: list target names whose target state is in the
/// include set, one per line.
///
/// # Errors
///
/// Returns an error if reading the source state or resolving an entry
/// fails.
pub fn run(global: &GlobalOpts, opts: &ManagedOpts, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    let real = setup.real_system(StateMode::ReadOnly)?;
    let state = setup.source_state(&real)?;
    let mut output = String::new();
    for name in state.entries().keys() {
        if opts.include.includes(state.target_state(name)?) {
            output.push_str(name);
            output.push('\n');
        }
    }
    super::write_output(global, output.as_bytes())
}
