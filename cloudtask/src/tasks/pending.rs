//! Pollable handle to a task's eventual result.

use std::future::Future;

use futures_util::FutureExt;
use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};

use cloudtask_types::{ProviderError, TaskResult};

use super::panic_message;

/// Pending-result handle returned by [`AsyncTask::execute_async`](super::AsyncTask::execute_async).
///
/// Readiness checks and retrieval never block. Once the result has been taken
/// the handle stays empty.
#[derive(Debug)]
pub struct PendingResult {
    inner: Inner,
}

#[derive(Debug)]
enum Inner {
    Running(JoinHandle<TaskResult>),
    Ready(TaskResult),
    Taken,
}

impl PendingResult {
    /// Runs blocking work on the runtime's blocking pool.
    pub fn spawn_blocking<F>(runtime: &Handle, work: F) -> Self
    where
        F: FnOnce() -> TaskResult + Send + 'static,
    {
        Self {
            inner: Inner::Running(runtime.spawn_blocking(work)),
        }
    }

    /// Drives a future on the runtime.
    pub fn spawn<Fut>(runtime: &Handle, future: Fut) -> Self
    where
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        Self {
            inner: Inner::Running(runtime.spawn(future)),
        }
    }

    /// A handle that is already resolved.
    #[must_use]
    pub const fn ready(result: TaskResult) -> Self {
        Self {
            inner: Inner::Ready(result),
        }
    }

    /// Whether the result can be taken. Never blocks.
    #[must_use]
    pub fn is_done(&self) -> bool {
        match &self.inner {
            Inner::Running(handle) => handle.is_finished(),
            Inner::Ready(_) => true,
            Inner::Taken => false,
        }
    }

    /// Takes the result if it is ready, without blocking.
    ///
    /// Returns `None` while the work is still running or after the result was
    /// already taken. Work that panicked or was cancelled is reported as an
    /// error result naming `task_name`.
    pub fn take_result(&mut self, task_name: &str) -> Option<TaskResult> {
        match &mut self.inner {
            Inner::Running(handle) => {
                if !handle.is_finished() {
                    return None;
                }
                // Outside the coop budget, so a tick can drain any number of
                // finished handles.
                let outcome = tokio::task::unconstrained(handle).now_or_never()?;
                self.inner = Inner::Taken;
                Some(match outcome {
                    Ok(result) => result,
                    Err(e) => join_error_result(task_name, e),
                })
            }
            Inner::Ready(_) => match std::mem::replace(&mut self.inner, Inner::Taken) {
                Inner::Ready(result) => Some(result),
                _ => None,
            },
            Inner::Taken => None,
        }
    }
}

/// Converts a failed join into an error result.
fn join_error_result(task_name: &str, error: JoinError) -> TaskResult {
    let failure = if error.is_panic() {
        let reason = panic_message(&*error.into_panic());
        tracing::warn!(task = %task_name, reason = %reason, "task work panicked");
        ProviderError::Panicked {
            task: task_name.to_string(),
            reason,
        }
    } else {
        tracing::warn!(task = %task_name, "task work was cancelled");
        ProviderError::Cancelled {
            task: task_name.to_string(),
        }
    };
    TaskResult::from_error(failure)
}
