//! Tracing setup.
//!
//! The interactive UI owns the terminal, so it only logs when a file is
//! configured. One-shot commands log to stderr.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber. Returns `Ok(false)` when nothing was
/// installed (interactive mode without a log file).
pub fn init(log_file: Option<&Path>, interactive: bool) -> std::io::Result<bool> {
    if let Some(path) = log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let installed = tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init()
            .is_ok();
        return Ok(installed);
    }

    if interactive {
        return Ok(false);
    }

    Ok(tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok())
}
