// src/errors.rs

//! Crate-wide error types.
//!
//! - [`NerfpipeError`] covers configuration and application-level failures.
//! - [`AdmissionError`] explains why `Registry::try_add` refused a task.
//! - [`TransitionError`] guards the task status state machine.
//! - [`StageError`] / [`ProcessError`] are what a pipeline stage can fail with;
//!   the scheduler branches on [`StageError::failure_kind`].

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::task::TaskId;
use crate::types::{Stage, TaskStatus};

#[derive(Error, Debug)]
pub enum NerfpipeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, NerfpipeError>;

/// Reasons a task was not admitted to the work queue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("Too many tasks queued ({capacity} waiting). Try again later")]
    QueueFull { capacity: usize },

    #[error("the scheduler has stopped accepting tasks")]
    Closed,

    #[error("task {id} is {status}, only QUEUED tasks can be admitted")]
    NotQueued { id: TaskId, status: TaskStatus },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("illegal task status transition {from} -> {to}")]
pub struct TransitionError {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// A stage's external program exited unsuccessfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessError {
    pub program: String,
    pub args: Vec<String>,
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl ProcessError {
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(
                f,
                "program \"{}\" exited with status code {code}",
                self.command_line()
            ),
            None => write!(
                f,
                "program \"{}\" was terminated by a signal",
                self.command_line()
            ),
        }
    }
}

impl std::error::Error for ProcessError {}

/// Coarse classification used when recording a failed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    ToolFailure,
    Unexpected,
}

#[derive(Error, Debug)]
pub enum StageError {
    #[error("{0} stage exceeded its time budget")]
    Timeout(Stage),

    #[error(transparent)]
    ToolFailed(#[from] ProcessError),

    #[error("stage was cancelled")]
    Cancelled,

    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context} {path:?}: {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Unexpected(String),
}

impl StageError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            StageError::Timeout(_) => FailureKind::Timeout,
            StageError::ToolFailed(_) => FailureKind::ToolFailure,
            _ => FailureKind::Unexpected,
        }
    }
}
