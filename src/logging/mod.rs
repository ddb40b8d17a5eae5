//! Console and log-file output.
//!
//! Engine modules emit plain [`tracing`] events; command handlers go
//! through [`Logger`]. Three targets get special treatment in both sinks:
//! [`STAGE_TARGET`], [`DRY_RUN_TARGET`] and [`SYSTEM_TARGET`].

mod logger;
mod subscriber;
mod utils;

pub use logger::Logger;
pub use subscriber::{Verbosity, init_subscriber};

/// Phases of a command.
pub const STAGE_TARGET: &str = "chezmoi::stage";

/// Mutations a dry run would have made.
pub const DRY_RUN_TARGET: &str = "chezmoi::dry_run";

/// Calls traced by [`DebugSystem`](crate::system::DebugSystem).
pub const SYSTEM_TARGET: &str = "chezmoi::system";

/// Serializes `XDG_CACHE_HOME` manipulation across parallel test threads.
#[cfg(test)]
pub(crate) static TEST_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// A [`Logger`] whose log file lives in a fresh temporary cache directory,
/// with a thread-local subscriber feeding that file. Keep the guard alive
/// for the whole test.
#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) fn isolated_logger() -> (Logger, tempfile::TempDir, tracing::dispatcher::DefaultGuard) {
    use tracing_subscriber::{Layer as _, filter::LevelFilter, layer::SubscriberExt as _};
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let env_lock = TEST_ENV_MUTEX
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    // SAFETY: Protected by TEST_ENV_MUTEX; restored before lock is released.
    #[allow(unsafe_code)]
    unsafe {
        std::env::set_var("XDG_CACHE_HOME", tmp.path());
    }
    let file_layer = subscriber::FileLayer::new("test").expect("failed to create file layer");
    let log = Logger::new("test");
    #[allow(unsafe_code)]
    unsafe {
        std::env::remove_var("XDG_CACHE_HOME");
    }
    drop(env_lock);
    let subscriber =
        tracing_subscriber::registry().with(file_layer.with_filter(LevelFilter::DEBUG));
    let guard = tracing::dispatcher::set_default(&tracing::Dispatch::new(subscriber));
    (log, tmp, guard)
}
