// src/logging.rs
// Per-entry-point logging: one append-only file per day plus stderr, so
// cron captures failures in mail while the daily file keeps full history.

use anyhow::{Context, Result};
use chrono::Utc;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing for one entry point (`collector`, `scorer`, `query`).
/// Filter precedence: RUST_LOG, then LOG_LEVEL, then `info`.
pub fn init(entry: &str) -> Result<()> {
    let dir = PathBuf::from(std::env::var("PIPELINE_LOG_DIR").unwrap_or_else(|_| "logs".into()));
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;

    let path = dir.join(format!("{entry}-{}.log", Utc::now().format("%Y%m%d")));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into());
        EnvFilter::new(level)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
        .init();

    Ok(())
}
