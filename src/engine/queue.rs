// src/engine/queue.rs

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tracing::{debug, warn};

use crate::errors::AdmissionError;
use crate::task::Task;

/// Create the bounded FIFO connecting admission to the worker.
///
/// `capacity` is clamped to at least 1, as a zero-length queue would make
/// admission meaningless. Capacity counts tasks that have been admitted but not
/// yet picked up by the worker; the task currently being executed does not
/// occupy a slot.
pub fn task_queue(capacity: usize) -> (TaskQueue, QueueReceiver) {
    let capacity = capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity);
    (TaskQueue { tx, capacity }, QueueReceiver { rx })
}

/// Admission side of the queue.
#[derive(Debug, Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<Task>,
    capacity: usize,
}

impl TaskQueue {
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of admitted tasks waiting for the worker.
    pub fn len(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Enqueue without waiting. Never blocks on the worker.
    pub fn try_push(&self, task: Task) -> Result<(), AdmissionError> {
        match self.tx.try_send(task) {
            Ok(()) => {
                debug!(queued = self.len(), capacity = self.capacity, "task enqueued");
                Ok(())
            }
            Err(TrySendError::Full(task)) => {
                warn!(
                    task = %task.id(),
                    capacity = self.capacity,
                    "queue saturated; rejecting task"
                );
                Err(AdmissionError::QueueFull {
                    capacity: self.capacity,
                })
            }
            Err(TrySendError::Closed(task)) => {
                warn!(task = %task.id(), "queue closed; rejecting task");
                Err(AdmissionError::Closed)
            }
        }
    }
}

/// Worker side of the queue.
#[derive(Debug)]
pub struct QueueReceiver {
    rx: mpsc::Receiver<Task>,
}

impl QueueReceiver {
    /// Wait for the next task in arrival order. `None` once every
    /// [`TaskQueue`] handle is gone (or after [`close`](Self::close)) and the
    /// buffer is empty.
    pub async fn recv(&mut self) -> Option<Task> {
        self.rx.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<Task> {
        match self.rx.try_recv() {
            Ok(task) => Some(task),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Stop accepting new tasks; already buffered ones can still be received.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
