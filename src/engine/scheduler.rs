// src/engine/scheduler.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::core::{next_step, NextStep, STOPPED_BEFORE_START, UNEXPECTED_PREFIX};
use crate::engine::queue::QueueReceiver;
use crate::errors::{Result, StageError};
use crate::exec::{StageCancel, StageExecutor};
use crate::task::Task;
use crate::types::{Stage, TaskStatus};

/// The single worker that drives queued tasks through their stages.
///
/// Tasks are taken strictly in arrival order and executed one at a time; a
/// task's stages never overlap. Every per-task failure is recorded on the task
/// and the loop moves on to the next one.
pub struct Scheduler<E: StageExecutor> {
    queue: QueueReceiver,
    executor: Arc<E>,
    kill_grace: Duration,
    shutdown: watch::Receiver<bool>,
    shutdown_tx: watch::Sender<bool>,
}

impl<E: StageExecutor> Scheduler<E> {
    /// `kill_grace` bounds how long a timed-out stage may take to stop its
    /// process after being cancelled before it is aborted outright.
    pub fn new(queue: QueueReceiver, executor: E, kill_grace: Duration) -> Self {
        let (shutdown_tx, shutdown) = watch::channel(false);
        Self {
            queue,
            executor: Arc::new(executor),
            kill_grace,
            shutdown,
            shutdown_tx,
        }
    }

    /// Start the worker on the current Tokio runtime.
    pub fn spawn(self) -> SchedulerHandle {
        let shutdown_tx = self.shutdown_tx.clone();
        let join = tokio::spawn(self.run());
        SchedulerHandle { shutdown_tx, join }
    }

    /// Main worker loop.
    ///
    /// Runs until a stop is requested or every admission handle is gone.
    pub async fn run(mut self) {
        info!("scheduler worker started");

        loop {
            let task = tokio::select! {
                biased;

                _ = stop_requested(&mut self.shutdown) => {
                    info!("stop requested; worker exiting");
                    break;
                }

                next = self.queue.recv() => match next {
                    Some(task) => task,
                    None => {
                        info!("task queue closed; worker exiting");
                        break;
                    }
                },
            };

            self.process(task).await;
        }

        self.discard_pending();
        info!("scheduler worker finished");
    }

    /// Drive one task from QUEUED to a terminal state.
    async fn process(&self, task: Task) {
        let id = task.id();
        match task.status() {
            TaskStatus::Queued => {}
            status if status.is_terminal() => {
                // The same handle was admitted twice and already ran.
                debug!(task = %id, %status, "dequeued task already finished; skipping");
                return;
            }
            status => {
                warn!(task = %id, %status, "dequeued task is not QUEUED; failing it");
                let message = format!("{UNEXPECTED_PREFIX}task was dequeued while {status}");
                if let Err(e) = task.fail(message) {
                    error!(task = %id, error = %e, "cannot mark task failed");
                }
                return;
            }
        }

        info!(task = %id, strategy = %task.strategy(), "running task");
        let mut stage = Stage::Preprocess;

        loop {
            if let Err(e) = task.advance(stage.status()) {
                error!(task = %id, error = %e, "cannot enter stage");
                return;
            }

            let outcome = self.run_stage(&task, stage).await;

            match next_step(stage, task.status(), &outcome) {
                NextStep::Run(next) => stage = next,
                NextStep::Finish => {
                    if let Err(e) = task.advance(TaskStatus::Done) {
                        error!(task = %id, error = %e, "cannot mark task done");
                    } else {
                        info!(task = %id, "task done");
                    }
                    return;
                }
                NextStep::Fail(message) => {
                    warn!(task = %id, %stage, error = %message, "task failed");
                    if let Err(e) = task.fail(message) {
                        error!(task = %id, error = %e, "cannot mark task failed");
                    }
                    return;
                }
            }
        }
    }

    /// Run `stage` under the strategy's deadline for it.
    ///
    /// On expiry the stage is told to cancel and given `kill_grace` to kill
    /// its process; if it is still running after that it is aborted, which
    /// drops (and so kills) any child it holds.
    async fn run_stage(&self, task: &Task, stage: Stage) -> std::result::Result<(), StageError> {
        let budget = task.strategy().timeouts().for_stage(stage);
        let (trigger, cancel) = StageCancel::new();

        debug!(task = %task.id(), %stage, ?budget, "starting stage");
        let mut handle = tokio::spawn(self.executor.run_stage(task, stage, cancel));

        tokio::select! {
            joined = &mut handle => flatten_join(stage, joined),

            _ = tokio::time::sleep(budget) => {
                warn!(task = %task.id(), %stage, ?budget, "stage timed out; cancelling");
                trigger.cancel();

                match tokio::time::timeout(self.kill_grace, &mut handle).await {
                    Ok(joined) => {
                        debug!(task = %task.id(), %stage, result = ?joined, "timed-out stage wound down");
                    }
                    Err(_) => {
                        warn!(
                            task = %task.id(),
                            %stage,
                            grace = ?self.kill_grace,
                            "stage ignored cancellation; aborting it"
                        );
                        handle.abort();
                        let _ = handle.await;
                    }
                }
                Err(StageError::Timeout(stage))
            }
        }
    }

    /// Fail whatever is still queued once the worker stops.
    fn discard_pending(&mut self) {
        self.queue.close();
        let mut discarded = 0usize;
        while let Some(task) = self.queue.try_recv() {
            if task.fail(STOPPED_BEFORE_START).is_ok() {
                discarded += 1;
            }
        }
        if discarded > 0 {
            warn!(discarded, "failed tasks left in the queue at shutdown");
        }
    }
}

fn flatten_join(
    stage: Stage,
    joined: std::result::Result<std::result::Result<(), StageError>, tokio::task::JoinError>,
) -> std::result::Result<(), StageError> {
    match joined {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => Err(StageError::Unexpected(format!(
            "{stage} stage panicked"
        ))),
        Err(e) => Err(StageError::Unexpected(format!("{stage} stage aborted: {e}"))),
    }
}

/// Resolves once `stop` has been requested. A dropped handle never stops the
/// worker.
async fn stop_requested(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|stop| *stop).await.is_ok() {
        return;
    }
    std::future::pending::<()>().await
}

/// Control handle for a spawned [`Scheduler`].
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Ask the worker to finish its current task and exit, then wait for it.
    ///
    /// Tasks still queued are marked FAILED and admission is closed.
    pub async fn stop(self) -> Result<()> {
        self.shutdown_tx.send_replace(true);
        self.join.await.map_err(anyhow::Error::from)?;
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
