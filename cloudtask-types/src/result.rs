//! Terminal outcome of a cloud task.

use std::error::Error;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::failure::TaskFailure;

/// Identifier of a submitted task, based on UUID v7 for time-ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Creates a new time-ordered task identifier (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the inner UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The terminal outcome of one task.
///
/// Produced exactly once per task and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct TaskResult {
    /// Whether the task failed.
    pub has_errors: bool,
    /// Optional human-readable description of the outcome.
    pub description: Option<String>,
    /// Captured failure cause, if any.
    pub cause: Option<TaskFailure>,
}

impl TaskResult {
    /// A successful result without description.
    #[must_use]
    pub const fn success() -> Self {
        Self {
            has_errors: false,
            description: None,
            cause: None,
        }
    }

    /// A successful result carrying a description (e.g. provider task state).
    pub fn described(description: impl Into<String>) -> Self {
        Self {
            has_errors: false,
            description: Some(description.into()),
            cause: None,
        }
    }

    /// A failed result with an explicit description and cause.
    pub fn failed(description: impl Into<String>, cause: TaskFailure) -> Self {
        Self {
            has_errors: true,
            description: Some(description.into()),
            cause: Some(cause),
        }
    }

    /// A failed result built from an error: its display string becomes the
    /// description and the error itself the cause.
    pub fn from_error(error: impl Error + Send + Sync + 'static) -> Self {
        let cause = TaskFailure::new(error);
        Self::failed(cause.message(), cause)
    }

    /// Whether the task succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !self.has_errors
    }
}
