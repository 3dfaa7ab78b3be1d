//! Logging setup
//!
//! `LogContext::init` installs the process subscriber once; a second call
//! fails rather than reconfiguring logging behind the first caller's back.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Handle for the installed subscriber
#[derive(Debug)]
pub struct LogContext {
    log_file: Option<PathBuf>,
}

impl LogContext {
    /// Install the global subscriber
    ///
    /// Logs go to `gemini-lens-YYMMDD.log` in the configured directory, or
    /// to stderr when `to_file` is off. `RUST_LOG` overrides the level.
    pub fn init(config: &LoggingConfig) -> Result<Self> {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.level))
            .with_context(|| format!("Invalid log level '{}'", config.level))?;

        let (file_layer, stderr_layer, log_file) = if config.to_file {
            let dir = config.directory_path();
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let path = dir.join(log_file_name(Local::now().date_naive()));
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let layer = fmt::layer().with_writer(Arc::new(file)).with_ansi(false);
            (Some(layer), None, Some(path))
        } else {
            let layer = fmt::layer().with_writer(std::io::stderr);
            (None, Some(layer), None)
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(stderr_layer)
            .try_init()
            .context("Logging is already initialized")?;

        if let Some(path) = &log_file {
            info!("Logging initialized. Writing to {}", path.display());
        }
        Ok(Self { log_file })
    }

    /// File receiving the logs, if any
    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }
}

/// `gemini-lens-YYMMDD.log`
pub fn log_file_name(date: NaiveDate) -> String {
    format!("gemini-lens-{}.log", date.format("%y%m%d"))
}
