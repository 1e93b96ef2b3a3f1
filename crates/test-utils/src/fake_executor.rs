use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nerfpipe::errors::{ProcessError, StageError};
use nerfpipe::exec::{StageCancel, StageExecutor, StageFuture};
use nerfpipe::task::{Task, TaskId};
use nerfpipe::types::{Stage, TaskStatus};
use tokio::sync::Notify;

/// How a scripted stage behaves.
#[derive(Debug, Clone)]
pub enum StageBehaviour {
    /// Complete successfully right away.
    Succeed,
    /// Report a tool failure with this exit code.
    ExitWith(i32),
    /// Report an unexpected (non-tool) failure.
    Unexpected(String),
    /// Panic inside the stage.
    Panic,
    /// Succeed after this much (Tokio) time.
    Sleep(Duration),
    /// Never finish on its own; only returns once cancelled.
    Hang,
    /// Like `Hang`, but also ignores cancellation.
    HangIgnoringCancel,
    /// Wait for the gate to be notified, then succeed.
    Gate(Arc<Notify>),
}

/// One invocation observed by the [`ScriptedExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCall {
    pub task: TaskId,
    pub stage: Stage,
    /// Task status at the moment the stage was handed to the executor.
    pub status_at_start: TaskStatus,
}

/// A fake executor that:
/// - records every stage it is asked to run, in order
/// - behaves per stage as scripted (default: succeed)
/// - records which stages observed a cancellation
#[derive(Debug, Clone, Default)]
pub struct ScriptedExecutor {
    defaults: Arc<Mutex<HashMap<Stage, StageBehaviour>>>,
    per_task: Arc<Mutex<HashMap<(TaskId, Stage), StageBehaviour>>>,
    calls: Arc<Mutex<Vec<StageCall>>>,
    cancelled: Arc<Mutex<Vec<(TaskId, Stage)>>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Behaviour of `stage` for every task without a task-specific override.
    pub fn on_stage(self, stage: Stage, behaviour: StageBehaviour) -> Self {
        self.defaults.lock().unwrap().insert(stage, behaviour);
        self
    }

    /// Behaviour of `stage` for one task only.
    pub fn on_task_stage(self, task: TaskId, stage: Stage, behaviour: StageBehaviour) -> Self {
        self.per_task.lock().unwrap().insert((task, stage), behaviour);
        self
    }

    pub fn calls(&self) -> Vec<StageCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, task: TaskId) -> Vec<StageCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.task == task)
            .collect()
    }

    /// Order in which tasks entered preprocessing.
    pub fn started_order(&self) -> Vec<TaskId> {
        self.calls()
            .into_iter()
            .filter(|c| c.stage == Stage::Preprocess)
            .map(|c| c.task)
            .collect()
    }

    pub fn cancelled(&self) -> Vec<(TaskId, Stage)> {
        self.cancelled.lock().unwrap().clone()
    }

    fn behaviour_for(&self, task: TaskId, stage: Stage) -> StageBehaviour {
        if let Some(b) = self.per_task.lock().unwrap().get(&(task, stage)) {
            return b.clone();
        }
        self.defaults
            .lock()
            .unwrap()
            .get(&stage)
            .cloned()
            .unwrap_or(StageBehaviour::Succeed)
    }
}

impl StageExecutor for ScriptedExecutor {
    fn run_stage(&self, task: &Task, stage: Stage, mut cancel: StageCancel) -> StageFuture {
        let id = task.id();
        self.calls.lock().unwrap().push(StageCall {
            task: id,
            stage,
            status_at_start: task.status(),
        });

        let behaviour = self.behaviour_for(id, stage);
        let cancelled = Arc::clone(&self.cancelled);

        Box::pin(async move {
            match behaviour {
                StageBehaviour::Succeed => Ok(()),
                StageBehaviour::ExitWith(code) => Err(StageError::ToolFailed(ProcessError {
                    program: format!("fake-{}", stage.name()),
                    args: vec![id.to_string()],
                    code: Some(code),
                })),
                StageBehaviour::Unexpected(msg) => Err(StageError::Unexpected(msg)),
                StageBehaviour::Panic => panic!("scripted panic in {stage} stage"),
                StageBehaviour::Sleep(d) => {
                    tokio::time::sleep(d).await;
                    Ok(())
                }
                StageBehaviour::Hang => {
                    cancel.cancelled().await;
                    cancelled.lock().unwrap().push((id, stage));
                    Err(StageError::Cancelled)
                }
                StageBehaviour::HangIgnoringCancel => {
                    std::future::pending::<()>().await;
                    Ok(())
                }
                StageBehaviour::Gate(gate) => {
                    gate.notified().await;
                    Ok(())
                }
            }
        })
    }
}
