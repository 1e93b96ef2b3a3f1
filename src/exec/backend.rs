// src/exec/backend.rs

//! Pluggable stage executor abstraction.
//!
//! The scheduler talks to a `StageExecutor` instead of spawning processes
//! itself. This makes it easy to swap in a fake executor in tests while
//! keeping the production implementation here.
//!
//! - `ProcessStageExecutor` is the default implementation used by `nerfpipe`.
//!   It asks the task's strategy which command a stage needs and runs it with
//!   a [`ProcessRunner`] writing to the task's log.
//! - Tests can provide their own `StageExecutor` that, for example, records
//!   which stages were invoked and succeeds, fails or hangs on demand.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use crate::config::ToolsSection;
use crate::errors::StageError;
use crate::exec::cancel::StageCancel;
use crate::exec::process::ProcessRunner;
use crate::fs::FileSystem;
use crate::task::{Task, TaskLayout};
use crate::types::Stage;

pub type StageFuture = Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + 'static>>;

/// Trait abstracting how a single stage of a task is carried out.
///
/// The returned future owns everything it needs; the scheduler runs it on a
/// separate Tokio task so that a panicking stage cannot take the worker down.
/// Implementations should return promptly once `cancel` fires.
pub trait StageExecutor: Send + Sync + 'static {
    fn run_stage(&self, task: &Task, stage: Stage, cancel: StageCancel) -> StageFuture;
}

impl<E: StageExecutor + ?Sized> StageExecutor for Arc<E> {
    fn run_stage(&self, task: &Task, stage: Stage, cancel: StageCancel) -> StageFuture {
        (**self).run_stage(task, stage, cancel)
    }
}

/// Real executor used in production.
#[derive(Debug, Clone)]
pub struct ProcessStageExecutor {
    layout: TaskLayout,
    tools: Arc<ToolsSection>,
    fs: Arc<dyn FileSystem>,
}

impl ProcessStageExecutor {
    pub fn new(layout: TaskLayout, tools: ToolsSection, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            layout,
            tools: Arc::new(tools),
            fs,
        }
    }

    pub fn layout(&self) -> &TaskLayout {
        &self.layout
    }
}

impl StageExecutor for ProcessStageExecutor {
    fn run_stage(&self, task: &Task, stage: Stage, mut cancel: StageCancel) -> StageFuture {
        let paths = self.layout.paths_for(task.id());
        let profile = task.strategy().profile();
        let tools = Arc::clone(&self.tools);
        let fs = Arc::clone(&self.fs);
        let task_id = task.id();

        Box::pin(async move {
            // Resolving the render config walks the model directory.
            let lookup_paths = paths.clone();
            let command = tokio::task::spawn_blocking(move || {
                profile.build_command(stage, &lookup_paths, &tools, fs.as_ref())
            })
            .await
            .map_err(|e| StageError::Unexpected(format!("resolving {stage} command: {e}")))??;
            debug!(task = %task_id, %stage, %command, "resolved stage command");

            ProcessRunner::new(&paths.log_file)
                .run_command(&command, &mut cancel)
                .await
        })
    }
}
