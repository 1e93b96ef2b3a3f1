// src/task/mod.rs

//! The unit of work and its path layout.
//!
//! A [`Task`] is a cheap-to-clone shared handle. Only the worker mutates
//! `status` and `error` (the mutators are crate-private); any number of
//! readers observe them without locking:
//! `status` is an atomic and `error` is a write-once cell that is always filled
//! before `status` becomes `FAILED`.

pub mod paths;

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::TransitionError;
use crate::strategy::StrategyKind;
use crate::types::TaskStatus;

pub use paths::{TaskLayout, TaskPaths};

/// Opaque, process-unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn generate() -> Self {
        TaskId(Uuid::new_v4())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(TaskId)
    }
}

#[derive(Debug)]
struct TaskInner {
    id: TaskId,
    created_at: DateTime<Utc>,
    strategy: StrategyKind,
    status: AtomicU8,
    error: OnceLock<String>,
}

/// Live handle to a task. Clones share state.
#[derive(Debug, Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

impl Task {
    /// Create a fresh task in `QUEUED` state.
    pub fn new(strategy: StrategyKind) -> Self {
        Self {
            inner: Arc::new(TaskInner {
                id: TaskId::generate(),
                created_at: Utc::now(),
                strategy,
                status: AtomicU8::new(TaskStatus::Queued as u8),
                error: OnceLock::new(),
            }),
        }
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    pub fn strategy(&self) -> StrategyKind {
        self.inner.strategy
    }

    pub fn status(&self) -> TaskStatus {
        TaskStatus::from_u8(self.inner.status.load(Ordering::Acquire))
    }

    pub fn error(&self) -> Option<&str> {
        // Only trust the cell once FAILED is visible; see `fail`.
        if self.status() == TaskStatus::Failed {
            self.inner.error.get().map(String::as_str)
        } else {
            None
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Move to the next non-failure status along the pipeline.
    pub(crate) fn advance(&self, next: TaskStatus) -> Result<TaskStatus, TransitionError> {
        if next == TaskStatus::Failed {
            return Err(TransitionError {
                from: self.status(),
                to: next,
            });
        }
        self.transition(next)
    }

    /// Record `message` and move to `FAILED`.
    ///
    /// The error is written before the status flips, so a concurrent reader
    /// never sees `FAILED` without an error.
    pub(crate) fn fail(&self, message: impl Into<String>) -> Result<TaskStatus, TransitionError> {
        let from = self.status();
        if !from.can_transition_to(TaskStatus::Failed) {
            return Err(TransitionError {
                from,
                to: TaskStatus::Failed,
            });
        }
        // Non-terminal implies the cell is still empty.
        let _ = self.inner.error.set(message.into());
        self.transition(TaskStatus::Failed)
    }

    fn transition(&self, next: TaskStatus) -> Result<TaskStatus, TransitionError> {
        let mut current = self.inner.status.load(Ordering::Acquire);
        loop {
            let from = TaskStatus::from_u8(current);
            if !from.can_transition_to(next) {
                return Err(TransitionError { from, to: next });
            }
            match self.inner.status.compare_exchange(
                current,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(from),
                Err(actual) => current = actual,
            }
        }
    }

    /// Point-in-time copy suitable for printing or serializing.
    pub fn snapshot(&self) -> TaskSnapshot {
        let status = self.status();
        TaskSnapshot {
            id: self.id(),
            created_at: self.created_at(),
            status,
            error: self.error().map(str::to_string),
            strategy: self.strategy(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub created_at: DateTime<Utc>,
    pub status: TaskStatus,
    pub error: Option<String>,
    pub strategy: StrategyKind,
}
