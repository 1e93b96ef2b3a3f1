// src/logging.rs

//! `tracing` subscriber for the `nerfpipe` binary.
//!
//! The filter comes from, in order:
//! 1. `--log-level`, applied to every target
//! 2. `NERFPIPE_LOG`, parsed as `EnvFilter` directives, so both `debug` and
//!    `nerfpipe::engine=trace,info` work
//! 3. `info`
//!
//! Everything goes to stderr; stdout only carries the task summary. Output of
//! the external tools never reaches either, it is appended to each task's
//! `log.txt`.

use anyhow::{Context, Result};
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "NERFPIPE_LOG";

pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = match cli_level {
        Some(lvl) => EnvFilter::new(lvl.as_directive()),
        None => match std::env::var(LOG_ENV_VAR) {
            Ok(raw) if !raw.trim().is_empty() => EnvFilter::try_new(raw.trim())
                .with_context(|| format!("invalid {LOG_ENV_VAR} value {raw:?}"))?,
            _ => EnvFilter::new("info"),
        },
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("installing the tracing subscriber")?;

    Ok(())
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}
