//! Simulated VM start-up run.
//!
//! Submits one start operation per simulated agent to an
//! [`AsyncTaskExecutor`], and folds every failed start into a
//! [`CloudErrorMap`] as it is reported. A fixed-delay status job logs the
//! current error types while the run is in flight.

use std::sync::Arc;
use std::time::Duration;

use cloudtask::errors::CloudErrorMap;
use cloudtask::tasks::{AsyncTaskExecutor, CallableTask, TaskCallbackHandler};
use cloudtask::{CloudErrorInfo, CloudErrorType, ProviderError, TaskFailure, TypedErrorInfo};
use tokio::sync::mpsc;

use crate::config::ScenarioConfig;

/// Snapshot name every simulated agent is cloned from.
pub const BASE_SNAPSHOT: &str = "clean";

/// Outcome of one simulated start, as reported by its callback.
#[derive(Debug)]
enum Outcome {
    Started,
    Failed {
        instance: String,
        cause: Option<TaskFailure>,
    },
}

/// Forwards a task's outcome to the scenario runner.
struct OutcomeReporter {
    instance: String,
    outcomes: mpsc::UnboundedSender<Outcome>,
}

impl TaskCallbackHandler for OutcomeReporter {
    fn on_success(&self) {
        let _ = self.outcomes.send(Outcome::Started);
    }

    fn on_error(&self, cause: Option<&TaskFailure>) {
        let _ = self.outcomes.send(Outcome::Failed {
            instance: self.instance.clone(),
            cause: cause.cloned(),
        });
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Default)]
pub struct ScenarioReport {
    /// Operations submitted.
    pub submitted: usize,
    /// Operations that reported success.
    pub succeeded: usize,
    /// Operations that reported an error.
    pub failed: usize,
    /// Aggregated error snapshot at the end of the run.
    pub snapshot: Option<Arc<CloudErrorInfo>>,
}

/// Whether the 1-based `index`-th operation is simulated to fail.
#[must_use]
pub const fn should_fail(index: usize, fail_every: usize) -> bool {
    fail_every != 0 && index % fail_every == 0
}

/// Error slot for a failed start of `instance`.
#[must_use]
pub fn start_failure(instance: &str, cause: Option<TaskFailure>) -> TypedErrorInfo {
    let kind = CloudErrorType::InstanceCannotStart;
    let info = TypedErrorInfo::new(
        format!("{}:{instance}", kind.key()),
        kind.describe(instance, BASE_SNAPSHOT),
    );
    match cause {
        Some(cause) => info.with_details(cause.message()).with_cause(cause),
        None => info,
    }
}

/// Runs the simulated workload to completion.
///
/// The executor must already be started; the run ends once every submitted
/// operation has been delivered. The error map is rewritten after each
/// failure, so readers see the failures accumulate.
pub async fn run(
    config: &ScenarioConfig,
    executor: &AsyncTaskExecutor,
    errors: &Arc<CloudErrorMap>,
) -> ScenarioReport {
    errors.clear();

    let status_errors = Arc::clone(errors);
    if let Err(e) = executor.schedule_with_fixed_delay(
        "scenario status",
        config.status_interval,
        config.status_interval,
        move || {
            tracing::info!(errors = ?status_errors.error_types(), "scenario status");
        },
    ) {
        tracing::warn!(error = %e, "could not schedule status job");
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    for index in 1..=config.tasks {
        let instance = format!("agent-{index}");
        let task = Arc::new(simulated_start(
            &instance,
            config.task_duration,
            should_fail(index, config.fail_every),
        ));
        executor.execute_async(
            task,
            OutcomeReporter {
                instance,
                outcomes: tx.clone(),
            },
        );
    }
    drop(tx);

    let mut report = ScenarioReport {
        submitted: config.tasks,
        ..ScenarioReport::default()
    };
    let mut failures = Vec::new();
    while let Some(outcome) = rx.recv().await {
        match outcome {
            Outcome::Started => report.succeeded += 1,
            Outcome::Failed { instance, cause } => {
                report.failed += 1;
                tracing::warn!(instance = %instance, "simulated start failed");
                failures.push(start_failure(&instance, cause));
                errors.update_errors(failures.iter().cloned());
            }
        }
    }

    report.snapshot = errors.error_info();
    tracing::info!(
        submitted = report.submitted,
        succeeded = report.succeeded,
        failed = report.failed,
        "scenario finished"
    );
    report
}

/// A start operation that blocks for `duration` and then succeeds or fails.
fn simulated_start(
    instance: &str,
    duration: Duration,
    fail: bool,
) -> CallableTask<impl FnOnce() -> Result<Option<String>, ProviderError> + Send + 'static> {
    let owned = instance.to_string();
    CallableTask::new(format!("start {instance}"), move || {
        std::thread::sleep(duration);
        if fail {
            Err(ProviderError::OperationFailed {
                operation: "PowerOnVM_Task".to_string(),
                reason: format!("host of {owned} is in maintenance mode"),
            })
        } else {
            Ok(Some(format!("{owned} is running")))
        }
    })
}
