//! Background executor that polls submitted tasks and delivers callbacks.
//!
//! Submissions travel over an unbounded channel to a single polling loop,
//! which is the only owner of the tracking table. Each tick the loop drains
//! new submissions, checks every tracked [`PendingResult`] without blocking,
//! and for every resolved one removes the entry and notifies its
//! [`TaskCallbackHandler`]. An entry leaves the table before its callback
//! runs, so no task is ever delivered twice.
//!
//! # Architecture
//!
//! ```text
//! callers ── execute_async ──► mpsc ──► polling loop (fixed delay)
//!                                          │ take_result()
//!                                          ▼
//!                              on_complete → on_success | on_error
//! ```

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use cloudtask_types::{ProviderError, TaskFailure, TaskId, TaskResult};

use super::schedule::spawn_fixed_delay;
use super::{AsyncTask, NoopCallback, PendingResult, TaskCallbackHandler, panic_message};

/// Default delay between two polling ticks.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(300);

/// Default time [`AsyncTaskExecutor::dispose`] waits for the loop to stop.
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Default age after which an unresolved task is reported as long-running.
const DEFAULT_LONG_TASK_THRESHOLD: Duration = Duration::from_secs(60);

/// Errors returned by [`AsyncTaskExecutor`] lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// The executor was created outside a tokio runtime.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    /// [`AsyncTaskExecutor::start`] was already called.
    #[error("executor polling loop is already running")]
    AlreadyStarted,

    /// The executor was disposed.
    #[error("executor has been disposed")]
    Disposed,
}

/// Timing configuration for [`AsyncTaskExecutor`].
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Delay between the end of one polling tick and the start of the next.
    pub poll_interval: Duration,
    /// How long [`AsyncTaskExecutor::dispose`] waits for the loop to stop.
    pub shutdown_grace: Duration,
    /// Age after which an unresolved task is logged as long-running.
    pub long_task_threshold: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            long_task_threshold: DEFAULT_LONG_TASK_THRESHOLD,
        }
    }
}

/// One submitted task as owned by the polling loop.
struct TrackedTask {
    id: TaskId,
    name: String,
    pending: PendingResult,
    callback: Box<dyn TaskCallbackHandler>,
    started_at: Instant,
    long_reported_at: Option<Instant>,
}

impl std::fmt::Debug for TrackedTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedTask")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("pending", &self.pending)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

/// State of the polling loop: the tracking table and its inbox.
struct Tracker {
    inbox: mpsc::UnboundedReceiver<TrackedTask>,
    tasks: HashMap<TaskId, TrackedTask>,
    tracked: Arc<AtomicUsize>,
    long_task_threshold: Duration,
    shutdown: CancellationToken,
}

impl Tracker {
    /// One polling tick.
    ///
    /// Stops delivering as soon as shutdown is signalled, so a tick that
    /// outlives [`AsyncTaskExecutor::dispose`] invokes no further callbacks.
    fn tick(&mut self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        let tick_started = Instant::now();

        while let Ok(task) = self.inbox.try_recv() {
            self.tasks.insert(task.id, task);
        }

        let size = self.tasks.len();
        let mut finished = Vec::new();
        for task in self.tasks.values_mut() {
            if let Some(result) = task.pending.take_result(&task.name) {
                finished.push((task.id, result));
            } else {
                report_if_long_running(task, self.long_task_threshold);
            }
        }

        for (id, result) in finished {
            if self.shutdown.is_cancelled() {
                tracing::debug!("shutdown requested; skipping remaining deliveries");
                return;
            }
            if let Some(task) = self.tasks.remove(&id) {
                deliver(&task, &result);
            }
        }

        self.tracked.store(self.tasks.len(), Ordering::Release);
        tracing::debug!(
            processed = size,
            elapsed_ms = tick_started.elapsed().as_millis(),
            "checked tracked tasks"
        );
    }
}

/// Logs an unresolved task once per threshold interval after it exceeds the
/// threshold.
fn report_if_long_running(task: &mut TrackedTask, threshold: Duration) {
    let running_for = task.started_at.elapsed();
    if running_for <= threshold {
        return;
    }
    if task
        .long_reported_at
        .is_none_or(|reported| reported.elapsed() > threshold)
    {
        tracing::info!(
            task = %task.name,
            task_id = %task.id,
            running_secs = running_for.as_secs(),
            "detected long running task"
        );
        task.long_reported_at = Some(Instant::now());
    }
}

/// Invokes the callback of a resolved task, containing any panic.
fn deliver(task: &TrackedTask, result: &TaskResult) {
    if task.long_reported_at.is_some() {
        tracing::info!(
            task = %task.name,
            took_secs = task.started_at.elapsed().as_secs(),
            "long operation finished"
        );
    }

    if result.has_errors {
        tracing::debug!(
            task = %task.name,
            description = result.description.as_deref().unwrap_or_default(),
            "task finished with errors"
        );
    } else {
        tracing::debug!(task = %task.name, "task finished");
    }

    let callback = &task.callback;
    let complete_panic = catch_unwind(AssertUnwindSafe(|| callback.on_complete()))
        .err()
        .map(|payload| {
            let reason = panic_message(&*payload);
            tracing::warn!(
                task = %task.name,
                task_id = %task.id,
                reason = %reason,
                "on_complete panicked"
            );
            TaskFailure::new(ProviderError::CallbackPanicked {
                task: task.name.clone(),
                reason,
            })
        });

    let outcome = catch_unwind(AssertUnwindSafe(|| match &complete_panic {
        Some(failure) => callback.on_error(Some(failure)),
        None if result.has_errors => callback.on_error(result.cause.as_ref()),
        None => callback.on_success(),
    }));
    if let Err(payload) = outcome {
        tracing::warn!(
            task = %task.name,
            task_id = %task.id,
            reason = %panic_message(&*payload),
            "callback panicked"
        );
    }
}

/// Runs provider operations in the background and delivers their outcome.
///
/// Call [`start`](Self::start) once, submit work with
/// [`execute_async`](Self::execute_async), and [`dispose`](Self::dispose) on
/// shutdown. Dropping the executor stops its loops without waiting.
pub struct AsyncTaskExecutor {
    config: ExecutorConfig,
    runtime: Handle,
    submissions: mpsc::UnboundedSender<TrackedTask>,
    /// Inbox waiting for [`start`](Self::start); `None` once the loop owns it.
    inbox: Mutex<Option<mpsc::UnboundedReceiver<TrackedTask>>>,
    shutdown: CancellationToken,
    poll_loop: Mutex<Option<JoinHandle<()>>>,
    scheduled: Mutex<Vec<JoinHandle<()>>>,
    tracked: Arc<AtomicUsize>,
    disposed: AtomicBool,
}

impl AsyncTaskExecutor {
    /// Creates an executor bound to the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::NoRuntime`] when called outside a runtime.
    pub fn new(config: ExecutorConfig) -> Result<Self, ExecutorError> {
        Ok(Self::with_runtime(config, Handle::try_current()?))
    }

    /// Creates an executor that spawns its loops and task work on `runtime`.
    #[must_use]
    pub fn with_runtime(config: ExecutorConfig, runtime: Handle) -> Self {
        let (submissions, inbox) = mpsc::unbounded_channel();
        Self {
            config,
            runtime,
            submissions,
            inbox: Mutex::new(Some(inbox)),
            shutdown: CancellationToken::new(),
            poll_loop: Mutex::new(None),
            scheduled: Mutex::new(Vec::new()),
            tracked: Arc::new(AtomicUsize::new(0)),
            disposed: AtomicBool::new(false),
        }
    }

    /// The timing configuration in use.
    #[must_use]
    pub const fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Starts the polling loop; `name` labels it in logs.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::AlreadyStarted`] on a second call (no second
    /// loop is spawned) and [`ExecutorError::Disposed`] after
    /// [`dispose`](Self::dispose).
    pub fn start(&self, name: &str) -> Result<(), ExecutorError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(ExecutorError::Disposed);
        }
        let Some(inbox) = self.inbox.lock().take() else {
            tracing::warn!(executor = %name, "executor already started; ignoring start");
            return Err(ExecutorError::AlreadyStarted);
        };

        let mut tracker = Tracker {
            inbox,
            tasks: HashMap::new(),
            tracked: Arc::clone(&self.tracked),
            long_task_threshold: self.config.long_task_threshold,
            shutdown: self.shutdown.clone(),
        };
        let handle = spawn_fixed_delay(
            &self.runtime,
            format!("{name}: check for tasks"),
            Duration::ZERO,
            self.config.poll_interval,
            self.shutdown.child_token(),
            move || tracker.tick(),
        );
        *self.poll_loop.lock() = Some(handle);

        tracing::info!(
            executor = %name,
            poll_interval_ms = self.config.poll_interval.as_millis(),
            "async task executor started"
        );
        Ok(())
    }

    /// Submits a task without completion notification.
    pub fn execute_async_default<T: AsyncTask + ?Sized>(&self, task: Arc<T>) {
        self.execute_async(task, NoopCallback);
    }

    /// Starts `task` and tracks it until it resolves, then notifies `callback`.
    ///
    /// Returns immediately. Failures, including a task that is already
    /// resolved or failed, are only ever reported through `callback`.
    /// Submissions after [`dispose`](Self::dispose) are dropped.
    pub fn execute_async<T, C>(&self, task: Arc<T>, callback: C)
    where
        T: AsyncTask + ?Sized,
        C: TaskCallbackHandler + 'static,
    {
        let name = task.name().to_string();
        if self.disposed.load(Ordering::Acquire) {
            tracing::warn!(task = %name, "executor disposed; dropping submitted task");
            return;
        }

        let started_at = task.start_time().unwrap_or_else(Instant::now);
        let pending = task.execute_async(&self.runtime);
        let tracked = TrackedTask {
            id: TaskId::new(),
            name,
            pending,
            callback: Box::new(callback),
            started_at,
            long_reported_at: None,
        };

        tracing::debug!(task = %tracked.name, task_id = %tracked.id, "task submitted");
        if let Err(mpsc::error::SendError(dropped)) = self.submissions.send(tracked) {
            tracing::warn!(task = %dropped.name, "polling loop is gone; dropping submitted task");
        }
    }

    /// Runs `job` on the runtime with fixed-delay semantics until
    /// [`dispose`](Self::dispose).
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Disposed`] after [`dispose`](Self::dispose).
    pub fn schedule_with_fixed_delay<F>(
        &self,
        name: &str,
        initial_delay: Duration,
        delay: Duration,
        job: F,
    ) -> Result<(), ExecutorError>
    where
        F: FnMut() + Send + 'static,
    {
        if self.disposed.load(Ordering::Acquire) {
            return Err(ExecutorError::Disposed);
        }
        let handle = spawn_fixed_delay(
            &self.runtime,
            name.to_string(),
            initial_delay,
            delay,
            self.shutdown.child_token(),
            job,
        );
        self.scheduled.lock().push(handle);
        Ok(())
    }

    /// Number of tasks the polling loop tracked at the end of its last tick.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.tracked.load(Ordering::Acquire)
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Stops all loops and discards every tracked task.
    ///
    /// Waits up to [`ExecutorConfig::shutdown_grace`] for the loops to finish
    /// their current run, aborting them afterwards. A callback already running
    /// at the deadline is left to return on its blocking thread, but no further
    /// callback is invoked. Callbacks of unresolved tasks are dropped without
    /// being invoked. Idempotent, and safe to call
    /// when [`start`](Self::start) never was.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shutdown.cancel();
        drop(self.inbox.lock().take());

        let deadline = tokio::time::Instant::now() + self.config.shutdown_grace;
        let poll_loop = self.poll_loop.lock().take();
        let scheduled: Vec<_> = self.scheduled.lock().drain(..).collect();
        for handle in poll_loop.into_iter().chain(scheduled) {
            join_until(handle, deadline).await;
        }

        self.tracked.store(0, Ordering::Release);
        tracing::info!("async task executor disposed");
    }
}

impl Drop for AsyncTaskExecutor {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Waits for a loop to finish until `deadline`, aborting it on timeout.
async fn join_until(mut handle: JoinHandle<()>, deadline: tokio::time::Instant) {
    match tokio::time::timeout_at(deadline, &mut handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(error = %e, "loop ended abnormally during shutdown"),
        Err(_) => {
            tracing::warn!("loop did not stop within the shutdown grace period; aborting");
            handle.abort();
        }
    }
}
