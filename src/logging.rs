//! Process-wide log sink: stdout plus a shared, append-only log file.
//!
//! Each line carries a timestamp, the level, the target (the emitting module, e.g.
//! `ironfeed::ingest::reader`) and the active `stage{dataset=..}` span. `RUST_LOG`
//! overrides the configured level.

use anyhow::{Context, Result};
use std::fs::{OpenOptions, create_dir_all};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Install the global subscriber. Call once per process.
///
/// # Errors
/// Returns an error if the level is not a valid filter, the log file cannot be
/// opened, or a subscriber is already installed.
pub fn init(log_file: Option<&Path>, level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("parse log level `{level}`"))?,
    };

    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(true);

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                create_dir_all(parent)
                    .with_context(|| format!("mkdir -p {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("install tracing subscriber")?;
    Ok(())
}
