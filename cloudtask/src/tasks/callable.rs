//! [`AsyncTask`] adapter for a fallible closure.

use std::error::Error;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

use cloudtask_types::{ProviderError, TaskResult};

use super::{AsyncTask, panic_message};

/// Runs a provider call once and caches its outcome.
///
/// The first [`execute_or_get_result`](AsyncTask::execute_or_get_result)
/// runs the closure; concurrent callers wait for it and later callers get the
/// cached result. `Ok(Some(description))` becomes a described success, `Err`
/// and panics become error results.
pub struct CallableTask<F> {
    name: String,
    work: Mutex<Option<F>>,
    started_at: OnceLock<Instant>,
    result: OnceLock<TaskResult>,
    done: AtomicBool,
}

impl<F, E> CallableTask<F>
where
    F: FnOnce() -> Result<Option<String>, E> + Send + 'static,
    E: Error + Send + Sync + 'static,
{
    /// Wraps `work` under the given task name.
    pub fn new(name: impl Into<String>, work: F) -> Self {
        Self {
            name: name.into(),
            work: Mutex::new(Some(work)),
            started_at: OnceLock::new(),
            result: OnceLock::new(),
            done: AtomicBool::new(false),
        }
    }

    fn run_once(&self) -> TaskResult {
        let _ = self.started_at.set(Instant::now());
        let work = self.work.lock().take();
        match work {
            Some(work) => match catch_unwind(AssertUnwindSafe(work)) {
                Ok(Ok(Some(description))) => TaskResult::described(description),
                Ok(Ok(None)) => TaskResult::success(),
                Ok(Err(e)) => TaskResult::from_error(e),
                Err(payload) => TaskResult::from_error(ProviderError::Panicked {
                    task: self.name.clone(),
                    reason: panic_message(&*payload),
                }),
            },
            None => TaskResult::from_error(ProviderError::Cancelled {
                task: self.name.clone(),
            }),
        }
    }
}

impl<F, E> AsyncTask for CallableTask<F>
where
    F: FnOnce() -> Result<Option<String>, E> + Send + 'static,
    E: Error + Send + Sync + 'static,
{
    fn execute_or_get_result(&self) -> TaskResult {
        let result = self.result.get_or_init(|| self.run_once()).clone();
        // Only flag completion once the result is stored.
        self.done.store(true, Ordering::Release);
        result
    }

    fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn start_time(&self) -> Option<Instant> {
        self.started_at.get().copied()
    }
}

impl<F> std::fmt::Debug for CallableTask<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallableTask")
            .field("name", &self.name)
            .field("started_at", &self.started_at.get())
            .field("done", &self.done.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
