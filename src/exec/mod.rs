// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the external tools of a
//! pipeline stage, using `tokio::process::Command`.
//!
//! - [`process`] runs one program with its output appended to the task log.
//! - [`cancel`] is the signal a deadline uses to stop a running stage.
//! - `group` keeps each tool in its own process group so a kill reaches
//!   everything it spawned.
//! - [`backend`] provides the `StageExecutor` trait and the concrete
//!   `ProcessStageExecutor` used in production, which tests can replace with
//!   a fake implementation.

pub mod backend;
pub mod cancel;
mod group;
pub mod process;

pub use backend::{ProcessStageExecutor, StageExecutor, StageFuture};
pub use cancel::{CancelTrigger, StageCancel};
pub use process::ProcessRunner;
