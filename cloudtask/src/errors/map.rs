//! Error map: typed errors in, one aggregated snapshot out.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;

use cloudtask_types::{CloudErrorInfo, TypedErrorInfo};

use super::{ErrorMessageUpdater, SimpleErrorMessages};

/// Holds the current set of typed errors and the snapshot derived from it.
///
/// Writers are serialized by a mutex and publish each new snapshot with a
/// single atomic swap, so [`error_info`](Self::error_info) never blocks and
/// never observes a snapshot built from a mix of old and new errors.
///
/// Errors are kept ordered by type key, which makes multi-error messages
/// reproducible.
pub struct CloudErrorMap {
    updater: Arc<dyn ErrorMessageUpdater>,
    errors: Mutex<BTreeMap<String, TypedErrorInfo>>,
    snapshot: ArcSwapOption<CloudErrorInfo>,
}

impl Default for CloudErrorMap {
    fn default() -> Self {
        Self::new(Arc::new(SimpleErrorMessages))
    }
}

impl CloudErrorMap {
    /// Creates an empty map using `updater` for message friendliness.
    #[must_use]
    pub fn new(updater: Arc<dyn ErrorMessageUpdater>) -> Self {
        Self {
            updater,
            errors: Mutex::new(BTreeMap::new()),
            snapshot: ArcSwapOption::empty(),
        }
    }

    /// Replaces all current errors with `errors` and recomputes the snapshot.
    ///
    /// When several errors share a type the last one wins. An empty batch
    /// clears the error state.
    pub fn update_errors(&self, errors: impl IntoIterator<Item = TypedErrorInfo>) {
        let fresh: BTreeMap<String, TypedErrorInfo> = errors
            .into_iter()
            .map(|error| (error.error_type().to_string(), error))
            .collect();
        let snapshot = self.summarize(&fresh).map(Arc::new);

        let mut current = self.errors.lock();
        tracing::debug!(
            previous = current.len(),
            current = fresh.len(),
            "updating cloud errors"
        );
        *current = fresh;
        self.snapshot.store(snapshot);
    }

    /// Drops every error; [`error_info`](Self::error_info) returns `None`
    /// afterwards.
    pub fn clear(&self) {
        let mut current = self.errors.lock();
        current.clear();
        self.snapshot.store(None);
    }

    /// The current aggregated snapshot, or `None` when there are no errors.
    #[must_use]
    pub fn error_info(&self) -> Option<Arc<CloudErrorInfo>> {
        self.snapshot.load_full()
    }

    /// Type keys of the current errors, in sorted order.
    #[must_use]
    pub fn error_types(&self) -> Vec<String> {
        self.errors.lock().keys().cloned().collect()
    }

    /// Collapses the errors into one snapshot.
    fn summarize(&self, errors: &BTreeMap<String, TypedErrorInfo>) -> Option<CloudErrorInfo> {
        let mut values = errors.values();
        let first = values.next()?;

        if values.next().is_none() {
            let message = first.message();
            let friendly = self.updater.friendly_message(message);
            let details = if friendly == message {
                first.details().to_string()
            } else {
                format!("{message}\n{}", first.details())
            };
            return Some(match first.cause() {
                Some(cause) => CloudErrorInfo::with_cause(friendly, details, cause.clone()),
                None => CloudErrorInfo::new(friendly, details),
            });
        }

        let message = errors
            .values()
            .map(|error| self.updater.friendly_message(error.message()))
            .collect::<Vec<_>>()
            .join(",");
        let details = errors
            .values()
            .map(|error| format!("[{}]", error.details()))
            .collect::<Vec<_>>()
            .join(",\n");
        Some(CloudErrorInfo::new(message, details))
    }
}

impl std::fmt::Debug for CloudErrorMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudErrorMap")
            .field("errors", &self.error_types())
            .field("snapshot", &self.error_info())
            .finish_non_exhaustive()
    }
}
