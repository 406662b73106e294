//! Asynchronous cloud tasks and their executor.
//!
//! A caller wraps a provider operation in an [`AsyncTask`], hands it to the
//! [`AsyncTaskExecutor`] together with a [`TaskCallbackHandler`], and moves on.
//! The executor obtains a [`PendingResult`] from the task, polls it on a
//! fixed-delay loop, and notifies the handler once the result is ready.

pub mod callable;
pub mod executor;
pub mod pending;
mod schedule;

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use tokio::runtime::Handle;

use cloudtask_types::{TaskFailure, TaskResult};

pub use callable::CallableTask;
pub use executor::{AsyncTaskExecutor, ExecutorConfig, ExecutorError};
pub use pending::PendingResult;

/// A unit of provider work that resolves to a [`TaskResult`].
///
/// Implementations must never let a failure escape
/// [`execute_or_get_result`](Self::execute_or_get_result): failures are
/// returned as results with `has_errors = true` and the cause captured.
pub trait AsyncTask: Send + Sync + 'static {
    /// Performs the work on the first call and returns the cached result on
    /// every later call.
    fn execute_or_get_result(&self) -> TaskResult;

    /// Whether a result is ready. Must not block.
    fn is_done(&self) -> bool;

    /// Task name, for diagnostics.
    fn name(&self) -> &str;

    /// When the work started, if it has.
    fn start_time(&self) -> Option<Instant>;

    /// Starts the work without blocking and returns a handle to its result.
    ///
    /// The default runs [`execute_or_get_result`](Self::execute_or_get_result)
    /// on the runtime's blocking pool. Tasks driven by an async provider API
    /// can override this with [`PendingResult::spawn`].
    fn execute_async(self: Arc<Self>, runtime: &Handle) -> PendingResult {
        PendingResult::spawn_blocking(runtime, move || self.execute_or_get_result())
    }
}

/// Receives the completion notifications of one task.
///
/// [`on_complete`](Self::on_complete) always fires first, followed by exactly
/// one of [`on_success`](Self::on_success) or [`on_error`](Self::on_error).
/// If `on_complete` panics, `on_error` receives a
/// [`ProviderError::CallbackPanicked`](cloudtask_types::ProviderError::CallbackPanicked)
/// cause instead of the task's own outcome. Callbacks run on the runtime's
/// blocking pool. All methods default to doing nothing.
pub trait TaskCallbackHandler: Send {
    /// The task resolved, successfully or not.
    fn on_complete(&self) {}

    /// The task resolved without errors.
    fn on_success(&self) {}

    /// The task resolved with errors.
    fn on_error(&self, cause: Option<&TaskFailure>) {
        let _ = cause;
    }
}

/// Callback handler that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCallback;

impl TaskCallbackHandler for NoopCallback {}

/// Extracts a readable reason from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    }
}
