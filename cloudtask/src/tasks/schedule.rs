//! Fixed-delay background loops.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::panic_message;

/// Spawns a loop that runs `job`, then waits `delay`, until `shutdown` fires.
///
/// Each run happens on the runtime's blocking pool, so a slow run occupies a
/// blocking thread instead of an async worker. The wait starts only after a
/// run returns, so a slow run never overlaps the next one. A panicking run is
/// logged and the loop carries on. Cancellation is checked between runs; a
/// run in progress is awaited.
pub(crate) fn spawn_fixed_delay<F>(
    runtime: &Handle,
    name: String,
    initial_delay: Duration,
    delay: Duration,
    shutdown: CancellationToken,
    job: F,
) -> JoinHandle<()>
where
    F: FnMut() + Send + 'static,
{
    let blocking = runtime.clone();
    runtime.spawn(async move {
        tracing::debug!(loop_name = %name, ?delay, "fixed-delay loop started");

        tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                tracing::debug!(loop_name = %name, "fixed-delay loop cancelled before first run");
                return;
            }
            () = tokio::time::sleep(initial_delay) => {}
        }

        let mut job = job;
        loop {
            let run = blocking.spawn_blocking(move || {
                let panicked = catch_unwind(AssertUnwindSafe(&mut job))
                    .err()
                    .map(|payload| panic_message(&*payload));
                (job, panicked)
            });
            match run.await {
                Ok((returned, panicked)) => {
                    job = returned;
                    if let Some(reason) = panicked {
                        tracing::warn!(loop_name = %name, reason = %reason, "scheduled run panicked");
                    }
                }
                Err(e) => {
                    tracing::debug!(loop_name = %name, error = %e, "scheduled run did not finish");
                    break;
                }
            }

            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        tracing::debug!(loop_name = %name, "fixed-delay loop stopped");
    })
}
