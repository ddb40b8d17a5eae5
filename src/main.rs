//! Entry point for the `chezmoi` binary.
use std::process::ExitCode;

use clap::Parser;

use chezmoi_cli::cli::{Cli, Command};
use chezmoi_cli::commands;
use chezmoi_cli::error::ExitFailure;
use chezmoi_cli::logging::{self, Logger, Verbosity};

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Apply(_) => "apply",
        Command::Diff(_) => "diff",
        Command::Archive(_) => "archive",
        Command::Dump(_) => "dump",
        Command::Verify(_) => "verify",
        Command::Data => "data",
        Command::Managed(_) => "managed",
        Command::Cat(_) => "cat",
        Command::ExecuteTemplate(_) => "execute-template",
        Command::Version => "version",
    }
}

fn main() -> ExitCode {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();
    let name = command_name(&args.command);
    logging::init_subscriber(Verbosity::from_flags(args.verbose, args.global.debug), name);
    let log = Logger::new(name);

    let result = match &args.command {
        Command::Apply(opts) => commands::apply::run(&args.global, opts, &log),
        Command::Diff(opts) => commands::diff::run(&args.global, opts, &log),
        Command::Archive(opts) => commands::archive::run(&args.global, opts, &log),
        Command::Dump(opts) => commands::dump::run(&args.global, opts, &log),
        Command::Verify(opts) => commands::verify::run(&args.global, opts, &log),
        Command::Data => commands::data::run(&args.global, &log),
        Command::Managed(opts) => commands::managed::run(&args.global, opts, &log),
        Command::Cat(opts) => commands::cat::run(&args.global, opts, &log),
        Command::ExecuteTemplate(opts) => {
            commands::execute_template::run(&args.global, opts, &log)
        }
        Command::Version => {
            let version = option_env!("CHEZMOI_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"));
            println!("chezmoi {version}");
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.is::<ExitFailure>() => ExitCode::FAILURE,
        Err(err) => {
            log.error(&format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}
