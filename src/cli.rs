//! Command-line argument definitions.
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::include::IncludeSet;

/// Top-level CLI entry point.
#[derive(Parser, Debug)]
#[command(
    name = "chezmoi",
    about = "Manage your dotfiles across multiple machines",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Source directory
    #[arg(short = 'S', long = "source", global = true)]
    pub source: Option<PathBuf>,

    /// Destination directory
    #[arg(short = 'D', long = "destination", global = true)]
    pub destination: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Preview changes without applying
    #[arg(short = 'n', long, global = true)]
    pub dry_run: bool,

    /// Trace every filesystem and state call
    #[arg(long, global = true)]
    pub debug: bool,

    /// Output format (json, toml, yaml)
    #[arg(long, global = true)]
    pub format: Option<String>,

    /// Write output to a file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Also remove targets listed in .chezmoiremove
    #[arg(long, global = true)]
    pub remove: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Update the destination directory to match the target state
    Apply(TargetOpts),
    /// Print the diff between the target state and the destination state
    Diff(TargetOpts),
    /// Write a tar archive of the target state
    Archive(TargetOpts),
    /// Write a dump of the target state
    Dump(TargetOpts),
    /// Exit with success if the destination state matches the target state
    Verify(TargetOpts),
    /// Print the template data
    Data,
    /// List the managed entries in the destination directory
    Managed(ManagedOpts),
    /// Print the target contents of a file or symlink
    Cat(CatOpts),
    /// Execute the given templates
    ExecuteTemplate(ExecuteTemplateOpts),
    /// Print version information
    Version,
}

/// Target selection shared by `apply`, `diff`, `archive`, `dump` and
/// `verify`.
#[derive(Parser, Debug, Clone)]
pub struct TargetOpts {
    /// Targets to operate on (default: all)
    pub targets: Vec<PathBuf>,

    /// Entry types to include (absent, dirs, files, scripts, symlinks, all, none)
    #[arg(short, long, default_value = "all")]
    pub include: IncludeSet,

    /// Do not recurse into target directories
    #[arg(long = "no-recursive", action = clap::ArgAction::SetFalse)]
    pub recursive: bool,
}

/// Options for the `managed` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct ManagedOpts {
    /// Entry types to include
    #[arg(short, long, default_value = "dirs,files,symlinks")]
    pub include: IncludeSet,
}

/// Options for the `cat` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct CatOpts {
    /// Targets to print
    #[arg(required = true)]
    pub targets: Vec<PathBuf>,
}

/// Options for the `execute-template` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct ExecuteTemplateOpts {
    /// Templates to execute (default: read from stdin)
    pub templates: Vec<String>,
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_apply_with_targets() {
        let cli = Cli::parse_from(["chezmoi", "apply", "~/.bashrc", "~/.ssh"]);
        assert!(
            matches!(&cli.command, Command::Apply(_)),
            "Expected Apply command"
        );
        if let Command::Apply(opts) = cli.command {
            assert_eq!(opts.targets.len(), 2);
            assert_eq!(opts.include, IncludeSet::ALL);
            assert!(opts.recursive);
        }
    }

    #[test]
    fn parse_global_directories() {
        let cli = Cli::parse_from(["chezmoi", "-S", "/src", "-D", "/dest", "diff"]);
        assert_eq!(cli.global.source, Some(PathBuf::from("/src")));
        assert_eq!(cli.global.destination, Some(PathBuf::from("/dest")));
        assert!(matches!(cli.command, Command::Diff(_)));
    }

    #[test]
    fn parse_dry_run_short() {
        let cli = Cli::parse_from(["chezmoi", "-n", "apply"]);
        assert!(cli.global.dry_run);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["chezmoi", "apply", "--debug", "--remove", "-v"]);
        assert!(cli.global.debug);
        assert!(cli.global.remove);
        assert!(cli.verbose);
    }

    #[test]
    fn parse_include() {
        let cli = Cli::parse_from(["chezmoi", "apply", "--include", "files,!scripts"]);
        if let Command::Apply(opts) = cli.command {
            assert_eq!(opts.include, IncludeSet::FILES);
        } else {
            panic!("expected apply");
        }
    }

    #[test]
    fn bad_include_is_rejected() {
        assert!(Cli::try_parse_from(["chezmoi", "apply", "--include", "bogus"]).is_err());
    }

    #[test]
    fn no_recursive_disables_recursion() {
        let cli = Cli::parse_from(["chezmoi", "verify", "--no-recursive", "x"]);
        if let Command::Verify(opts) = cli.command {
            assert!(!opts.recursive);
        } else {
            panic!("expected verify");
        }
    }

    #[test]
    fn managed_defaults_exclude_scripts() {
        let cli = Cli::parse_from(["chezmoi", "managed"]);
        if let Command::Managed(opts) = cli.command {
            assert!(!opts.include.contains(IncludeSet::SCRIPTS));
            assert!(opts.include.contains(IncludeSet::FILES));
        } else {
            panic!("expected managed");
        }
    }

    #[test]
    fn cat_requires_targets() {
        assert!(Cli::try_parse_from(["chezmoi", "cat"]).is_err());
    }

    #[test]
    fn parse_execute_template() {
        let cli = Cli::parse_from(["chezmoi", "execute-template", "{{ 1 + 1 }}"]);
        assert!(matches!(cli.command, Command::ExecuteTemplate(ref o) if o.templates.len() == 1));
    }

    #[test]
    fn parse_version() {
        let cli = Cli::parse_from(["chezmoi", "version"]);
        assert!(matches!(cli.command, Command::Version));
    }
}
