//! Tracing setup shared by the `devhop` and `devhop-host` binaries.
//!
//! Stderr is the user's channel (picker menus, diagnostics), so the console
//! layer stays at `warn` unless asked otherwise. Full debug output goes to a
//! daily rolling file under `~/.local/state/devhop/logs/`.

use crate::paths::Paths;
use std::env;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

pub const DEBUG_ENV: &str = "DEVHOP_DEBUG_LOG";

/// Installs the global subscriber. Keep the returned guard alive for the
/// lifetime of `main` so buffered file writes are flushed on exit.
pub fn init(app: &str) -> Option<WorkerGuard> {
    let console_filter = if debug_enabled() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(console_filter);

    let (file_layer, guard) = match file_writer(app) {
        Some((writer, guard)) => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(EnvFilter::new("debug"));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // A subscriber may already be installed (tests, embedding); ignore that.
    let _ = tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init();

    guard
}

fn debug_enabled() -> bool {
    env::var(DEBUG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

fn file_writer(
    app: &str,
) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let paths = Paths::from_env().ok()?;
    let dir = paths.log_dir();
    fs_err::create_dir_all(&dir).ok()?;
    let appender = tracing_appender::rolling::daily(dir, format!("{app}.log"));
    Some(tracing_appender::non_blocking(appender))
}
