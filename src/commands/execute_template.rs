//! Execute-template command implementation.
use std::io::Read as _;

use anyhow::{Context as _, Result};

use crate::cli::{ExecuteTemplateOpts, GlobalOpts};
use crate::logging::Logger;

use super::{CommandSetup, StateMode};

/// Run the execute-template command: render each argument, or stdin when
/// there are none, with the full template data.
///
/// # Errors
///
/// Returns an error if reading the source state or rendering fails.
pub fn run(global: &GlobalOpts, opts: &ExecuteTemplateOpts, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    let real = setup.real_system(StateMode::ReadOnly)?;
    let state = setup.source_state(&real)?;
    let output = if opts.templates.is_empty() {
        let mut input = Vec::new();
        std::io::stdin()
            .read_to_end(&mut input)
            .context("Failed to read stdin")?;
        state.execute_template_data("stdin", &input)?
    } else {
        let mut output = Vec::new();
        for (i, template) in opts.templates.iter().enumerate() {
            let name = format!("arg{}", i + 1);
            output.extend(state.execute_template_data(&name, template.as_bytes())?);
        }
        output
    };
    super::write_output(global, &output)
}
