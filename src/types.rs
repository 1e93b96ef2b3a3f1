use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a task.
///
/// `Queued -> Preprocessing -> Training -> Rendering -> Done`, with `Failed`
/// reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum TaskStatus {
    Queued = 0,
    Preprocessing = 1,
    Training = 2,
    Rendering = 3,
    Done = 4,
    Failed = 5,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed)
    }

    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        match (self, next) {
            (TaskStatus::Queued, TaskStatus::Preprocessing)
            | (TaskStatus::Preprocessing, TaskStatus::Training)
            | (TaskStatus::Training, TaskStatus::Rendering)
            | (TaskStatus::Rendering, TaskStatus::Done) => true,
            (from, TaskStatus::Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    /// The stage a task is executing while in this status.
    pub fn stage(self) -> Option<Stage> {
        match self {
            TaskStatus::Preprocessing => Some(Stage::Preprocess),
            TaskStatus::Training => Some(Stage::Train),
            TaskStatus::Rendering => Some(Stage::Render),
            _ => None,
        }
    }

    pub(crate) fn from_u8(raw: u8) -> TaskStatus {
        match raw {
            0 => TaskStatus::Queued,
            1 => TaskStatus::Preprocessing,
            2 => TaskStatus::Training,
            3 => TaskStatus::Rendering,
            4 => TaskStatus::Done,
            _ => TaskStatus::Failed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "QUEUED",
            TaskStatus::Preprocessing => "PREPROCESSING",
            TaskStatus::Training => "TRAINING",
            TaskStatus::Rendering => "RENDERING",
            TaskStatus::Done => "DONE",
            TaskStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One ordered phase of a task's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Preprocess,
    Train,
    Render,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Preprocess, Stage::Train, Stage::Render];

    /// Status a task holds while this stage runs.
    pub fn status(self) -> TaskStatus {
        match self {
            Stage::Preprocess => TaskStatus::Preprocessing,
            Stage::Train => TaskStatus::Training,
            Stage::Render => TaskStatus::Rendering,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Preprocess => "preprocess",
            Stage::Train => "train",
            Stage::Render => "render",
        }
    }

    /// Gerund used in user-facing failure messages ("Timeout on training").
    pub fn activity(self) -> &'static str {
        match self {
            Stage::Preprocess => "preprocessing",
            Stage::Train => "training",
            Stage::Render => "rendering",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What `Registry::add` does with a task when the queue is saturated.
///
/// - `KeepRegistered`: the task stays visible (QUEUED) in the registry but is
///   never executed. This is the default.
/// - `Reject`: registration and enqueueing succeed or fail together, so a
///   rejected task leaves no trace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionPolicy {
    #[default]
    KeepRegistered,
    Reject,
}

impl FromStr for AdmissionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keep_registered" | "keep-registered" => Ok(AdmissionPolicy::KeepRegistered),
            "reject" => Ok(AdmissionPolicy::Reject),
            other => Err(format!(
                "invalid admission policy: {other} (expected \"keep_registered\" or \"reject\")"
            )),
        }
    }
}
