// src/engine/registry.rs

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::engine::queue::{task_queue, QueueReceiver, TaskQueue};
use crate::errors::AdmissionError;
use crate::task::{Task, TaskId};
use crate::types::{AdmissionPolicy, TaskStatus};

/// Authoritative in-memory store of every known task, plus the admission side
/// of the work queue.
///
/// Cloning is cheap; clones share the same map and queue. Tasks are never
/// removed once registered.
#[derive(Debug, Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

#[derive(Debug)]
struct RegistryInner {
    tasks: RwLock<HashMap<TaskId, Task>>,
    queue: TaskQueue,
    policy: AdmissionPolicy,
}

impl Registry {
    /// Create a registry with a queue of `capacity` slots. The returned
    /// receiver belongs to the worker.
    pub fn new(capacity: usize, policy: AdmissionPolicy) -> (Registry, QueueReceiver) {
        let (queue, rx) = task_queue(capacity);
        let registry = Registry {
            inner: Arc::new(RegistryInner {
                tasks: RwLock::new(HashMap::new()),
                queue,
                policy,
            }),
        };
        (registry, rx)
    }

    /// Register `task` and try to enqueue it.
    ///
    /// Returns `false` when the task could not be queued, in which case the
    /// caller should ask its client to retry later. See [`try_add`](Self::try_add).
    pub fn add(&self, task: Task) -> bool {
        self.try_add(task).is_ok()
    }

    /// Register `task` and try to enqueue it, reporting why admission failed.
    ///
    /// With [`AdmissionPolicy::KeepRegistered`] a task refused by a full or
    /// closed queue stays visible in QUEUED state but will never run. With
    /// [`AdmissionPolicy::Reject`] a refused task is not registered at all.
    /// A task that is not QUEUED is refused under either policy and not
    /// registered.
    pub fn try_add(&self, task: Task) -> Result<(), AdmissionError> {
        let status = task.status();
        if status != TaskStatus::Queued {
            return Err(AdmissionError::NotQueued {
                id: task.id(),
                status,
            });
        }

        let id = task.id();
        let strategy = task.strategy();
        // Held across the (non-blocking) enqueue so map and queue change together.
        let mut tasks = self.inner.tasks.write();

        let result = match self.inner.policy {
            AdmissionPolicy::KeepRegistered => {
                tasks.insert(id, task.clone());
                self.inner.queue.try_push(task)
            }
            AdmissionPolicy::Reject => {
                let pushed = self.inner.queue.try_push(task.clone());
                if pushed.is_ok() {
                    tasks.insert(id, task);
                }
                pushed
            }
        };

        match &result {
            Ok(()) => info!(task = %id, %strategy, "task admitted"),
            Err(e) => debug!(task = %id, policy = ?self.inner.policy, error = %e, "task not admitted"),
        }
        result
    }

    /// Live handle to the task with `id`, or `None` if it was never registered.
    pub fn get(&self, id: &TaskId) -> Option<Task> {
        self.inner.tasks.read().get(id).cloned()
    }

    /// All known tasks. Order is unspecified.
    pub fn list(&self) -> Vec<Task> {
        self.inner.tasks.read().values().cloned().collect()
    }

    /// Admitted tasks the worker has not started yet.
    pub fn queued_len(&self) -> usize {
        self.inner.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.inner.queue.capacity()
    }

    pub fn policy(&self) -> AdmissionPolicy {
        self.inner.policy
    }

    pub fn is_accepting(&self) -> bool {
        !self.inner.queue.is_closed()
    }
}
