// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::strategy::StrategyKind;

/// Command-line arguments for `nerfpipe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "nerfpipe",
    version,
    about = "Queue image sets through preprocess, train and render, and track each task.",
    long_about = None
)]
pub struct CliArgs {
    /// Directories of input images; each one becomes a task.
    #[arg(value_name = "IMAGE_DIR")]
    pub inputs: Vec<PathBuf>,

    /// Path to the config file (TOML).
    ///
    /// Default: `nerfpipe.toml` in the current working directory if present,
    /// otherwise built-in defaults.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Pipeline variant (nerfacto, instant-ngp, vanilla-nerf).
    ///
    /// If omitted, `[config].default_strategy` is used.
    #[arg(long, value_name = "NAME", value_parser = parse_strategy)]
    pub strategy: Option<StrategyKind>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `NERFPIPE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print what each stage would run, but don't execute.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the final task states as JSON.
    #[arg(long)]
    pub json: bool,

    /// How often to poll task status, in milliseconds.
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    pub poll_ms: u64,
}

fn parse_strategy(s: &str) -> Result<StrategyKind, String> {
    s.parse()
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
