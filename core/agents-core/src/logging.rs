//! Tracing setup shared by the binaries.
//!
//! Logs go to a daily-rolling file under `<agents_home>/logs/`, never to the
//! terminal: hook output is consumed by the host tool, and the launcher's
//! terminal is in raw mode while the agent runs.
//!
//! `AGENTS_DEBUG_LOG=1` forces debug level; otherwise `RUST_LOG` applies,
//! defaulting to `info`.

use std::env;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::storage::StorageConfig;

pub const DEBUG_LOG_ENV: &str = "AGENTS_DEBUG_LOG";

/// Installs the global subscriber. Keep the guard alive until exit so buffered
/// lines are flushed. Returns `None` if the log directory is unusable; the
/// process then runs without logging.
pub fn init(storage: &StorageConfig, component: &str) -> Option<WorkerGuard> {
    let logs_dir = storage.logs_dir();
    if std::fs::create_dir_all(&logs_dir).is_err() {
        return None;
    }

    let appender = tracing_appender::rolling::daily(&logs_dir, format!("{component}.log"));
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .is_ok();

    installed.then_some(guard)
}

fn filter() -> EnvFilter {
    if debug_enabled(env::var(DEBUG_LOG_ENV).ok().as_deref()) {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

fn debug_enabled(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "true" | "TRUE" | "yes" | "YES"))
}
