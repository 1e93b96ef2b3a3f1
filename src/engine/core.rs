// src/engine/core.rs

//! Pure pieces of the task lifecycle.
//!
//! No Tokio, channels or processes here: given where a task is and how its
//! last stage ended, decide what happens next and how a failure is worded.
//! The async worker in [`scheduler`](super::scheduler) just carries these
//! decisions out.

use crate::errors::{FailureKind, StageError};
use crate::types::{Stage, TaskStatus};

/// Error recorded on a task that was still queued when the worker stopped.
pub const STOPPED_BEFORE_START: &str = "Scheduler stopped before the task started";

/// Leading text of every unexpected-failure message.
pub const UNEXPECTED_PREFIX: &str = "Unexpected error: ";

/// What the worker should do after a stage finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    /// Enter the given stage.
    Run(Stage),
    /// All stages succeeded; mark the task DONE.
    Finish,
    /// Record the message and mark the task FAILED.
    Fail(String),
}

/// The stage following `current`, or `None` after rendering.
pub fn stage_after(current: Stage) -> Option<Stage> {
    match current {
        Stage::Preprocess => Some(Stage::Train),
        Stage::Train => Some(Stage::Render),
        Stage::Render => None,
    }
}

/// Decide the next step once `stage` completed with `outcome`.
///
/// `status_now` is the task's status at the moment the outcome was observed;
/// a timeout message names the stage read from it.
pub fn next_step(
    stage: Stage,
    status_now: TaskStatus,
    outcome: &Result<(), StageError>,
) -> NextStep {
    match outcome {
        Ok(()) => match stage_after(stage) {
            Some(next) => NextStep::Run(next),
            None => NextStep::Finish,
        },
        Err(err) => NextStep::Fail(failure_message(status_now, err)),
    }
}

/// Human-readable error recorded on a failed task.
///
/// - timeout: `Timeout on <stage activity>`
/// - non-zero exit: `External tool failed: ...`
/// - anything else: `Unexpected error: ...`
pub fn failure_message(status_now: TaskStatus, err: &StageError) -> String {
    match err.failure_kind() {
        FailureKind::Timeout => {
            let activity = status_now
                .stage()
                .or(match err {
                    StageError::Timeout(stage) => Some(*stage),
                    _ => None,
                })
                .map(Stage::activity)
                .unwrap_or("unknown stage");
            format!("Timeout on {activity}")
        }
        FailureKind::ToolFailure => format!("External tool failed: {err}"),
        FailureKind::Unexpected => format!("{UNEXPECTED_PREFIX}{err}"),
    }
}
