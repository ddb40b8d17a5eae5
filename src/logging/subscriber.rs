//! Tracing subscriber: a quiet stderr console and a complete log file.
use std::fs;
use std::io::{IsTerminal as _, Write as _};
use std::sync::Mutex;

use tracing::Level;
use tracing_subscriber::filter::{LevelFilter, Targets};

use super::utils::{clock, log_file_path, timestamp};
use super::{DRY_RUN_TARGET, STAGE_TARGET, SYSTEM_TARGET};

/// How much reaches the console. The log file always records everything
/// down to `DEBUG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Warnings, errors and dry-run actions.
    Quiet,
    /// Also stages and informational messages (`-v`).
    Verbose,
    /// Also debug messages and every system call (`--debug`).
    Debug,
}

impl Verbosity {
    /// Map the `-v` and `--debug` flags; `--debug` wins.
    #[must_use]
    pub const fn from_flags(verbose: bool, debug: bool) -> Self {
        if debug {
            Self::Debug
        } else if verbose {
            Self::Verbose
        } else {
            Self::Quiet
        }
    }

    const fn level(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::WARN,
            Self::Verbose => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
        }
    }

    fn console_filter(self) -> Targets {
        Targets::new()
            .with_default(self.level())
            .with_target(DRY_RUN_TARGET, LevelFilter::INFO)
    }
}

#[derive(Default)]
struct MessageExtractor {
    message: String,
}

impl tracing::field::Visit for MessageExtractor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

fn message(event: &tracing::Event<'_>) -> String {
    let mut extractor = MessageExtractor::default();
    event.record(&mut extractor);
    extractor.message
}

/// Marker shown before the message for the special targets.
fn marker(target: &str) -> &'static str {
    match target {
        STAGE_TARGET => "==> ",
        DRY_RUN_TARGET => "[dry run] ",
        SYSTEM_TARGET => "[system] ",
        _ => "",
    }
}

/// Appends every event to `<command>.log`, truncated at the start of each
/// run.
#[derive(Debug)]
pub(super) struct FileLayer {
    file: Mutex<fs::File>,
}

impl FileLayer {
    /// Open the log file for `command` and write the run header. `None` if
    /// the file cannot be created.
    pub(super) fn new(command: &str) -> Option<Self> {
        let path = log_file_path(command)?;
        let version = option_env!("CHEZMOI_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"));
        let mut file = fs::File::create(&path).ok()?;
        writeln!(file, "# chezmoi {version} {command} {}", timestamp()).ok()?;
        Some(Self {
            file: Mutex::new(file),
        })
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for FileLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let metadata = event.metadata();
        let line = format!(
            "{} {:<5} {}{}",
            clock(),
            metadata.level().as_str(),
            marker(metadata.target()),
            message(event)
        );
        if let Ok(mut file) = self.file.lock() {
            writeln!(file, "{line}").ok();
        }
    }
}

/// Console layout: errors and warnings prefixed like the tool's own
/// messages, everything else indented under its stage.
struct ConsoleFormatter {
    ansi: bool,
}

impl ConsoleFormatter {
    fn paint(&self, code: &str, text: &str) -> String {
        if self.ansi {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }
}

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let target = metadata.target();
        let msg = message(event);
        match *metadata.level() {
            Level::ERROR => writeln!(writer, "{} {msg}", self.paint("31", "chezmoi:")),
            Level::WARN => writeln!(writer, "{} {msg}", self.paint("33", "chezmoi: warning:")),
            Level::INFO if target == STAGE_TARGET => {
                writeln!(
                    writer,
                    "{} {}",
                    self.paint("1;34", "==>"),
                    self.paint("1", &msg)
                )
            }
            Level::INFO if target == DRY_RUN_TARGET => {
                writeln!(writer, "  {} {msg}", self.paint("33", "[dry run]"))
            }
            Level::INFO => writeln!(writer, "  {msg}"),
            _ => writeln!(
                writer,
                "  {}",
                self.paint("2", &format!("{}{msg}", marker(target)))
            ),
        }
    }
}

/// Install the global subscriber. Call once, before any logging.
///
/// Console output goes to stderr so that stdout carries only command
/// output.
pub fn init_subscriber(verbosity: Verbosity, command: &str) {
    use tracing_subscriber::{
        Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
    };

    let console_layer = fmt::layer()
        .event_format(ConsoleFormatter {
            ansi: std::io::stderr().is_terminal(),
        })
        .with_writer(std::io::stderr)
        .with_filter(verbosity.console_filter());

    let file_layer = FileLayer::new(command).map(|layer| layer.with_filter(LevelFilter::DEBUG));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
}
