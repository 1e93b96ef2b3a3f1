// src/engine/mod.rs

//! Task lifecycle engine.
//!
//! This module ties together:
//! - the task registry and its bounded admission queue
//! - the single worker that drives each task through preprocess, train and
//!   render under per-stage deadlines
//!
//! The pure lifecycle decisions live in [`core`]; the async worker is
//! implemented in [`scheduler`].

use std::time::Duration;

use crate::config::ConfigFile;
use crate::exec::StageExecutor;
use crate::types::AdmissionPolicy;

pub mod core;
pub mod queue;
pub mod registry;
pub mod scheduler;

pub use self::core::{failure_message, next_step, NextStep};
pub use queue::{task_queue, QueueReceiver, TaskQueue};
pub use registry::Registry;
pub use scheduler::{Scheduler, SchedulerHandle};

/// Engine options shared by the registry and the worker.
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    /// Maximum number of admitted-but-unstarted tasks.
    pub queue_length: usize,
    pub admission: AdmissionPolicy,
    /// How long a timed-out stage may take to kill its process.
    pub kill_grace: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            queue_length: 10,
            admission: AdmissionPolicy::KeepRegistered,
            kill_grace: Duration::from_secs(10),
        }
    }
}

impl EngineOptions {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self {
            queue_length: cfg.config.queue_length,
            admission: cfg.config.admission,
            kill_grace: cfg.kill_grace(),
        }
    }
}

/// Build a registry and spawn its worker on the current Tokio runtime.
pub fn start<E: StageExecutor>(options: EngineOptions, executor: E) -> (Registry, SchedulerHandle) {
    let (registry, queue) = Registry::new(options.queue_length, options.admission);
    let handle = Scheduler::new(queue, executor, options.kill_grace).spawn();
    (registry, handle)
}
