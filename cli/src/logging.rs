//! Logging for the triptic CLI
//!
//! Logs go to `<data dir>/logs/triptic.log`; stderr is used when the file
//! cannot be opened.

use config::PathManager;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_FILTER: &str = "info,triptic_core=info";

/// Install the global subscriber. Keep the returned guard alive until exit
/// so buffered lines are flushed.
pub fn init_logging(verbose: bool) -> Option<WorkerGuard> {
    if verbose {
        init_stderr_logging();
        return None;
    }

    let Some(path) = PathManager::log_file_path() else {
        init_stderr_logging();
        return None;
    };

    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("[triptic] Failed to create log directory {:?}: {}", parent, e);
        }
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("[triptic] Failed to open log file {:?}: {}", path, e);
            init_stderr_logging();
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);
    let subscriber = tracing_subscriber::registry().with(filter()).with(
        fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_file(true)
            .with_line_number(true),
    );

    match tracing::subscriber::set_global_default(subscriber) {
        Ok(()) => tracing::debug!("Logging initialized, writing to {:?}", path),
        Err(e) => eprintln!("[triptic] Failed to set tracing subscriber: {}", e),
    }
    Some(guard)
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn init_stderr_logging() {
    let subscriber = tracing_subscriber::registry().with(filter()).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
}
