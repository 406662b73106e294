//! Failure causes carried by task results and reported errors.
//!
//! [`TaskFailure`] is the opaque cause attached to a failed
//! [`TaskResult`](crate::TaskResult) or a [`TypedErrorInfo`](crate::TypedErrorInfo).
//! It is cheap to clone so the same cause can travel to a callback and into
//! the error map at once. [`ProviderError`] covers the failures this crate
//! family produces itself.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Errors describing provider-side or execution-side failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The provider endpoint host name could not be resolved.
    #[error("{0}")]
    UnknownHost(String),

    /// The connection to the provider failed or was lost.
    #[error("connection to provider failed: {0}")]
    Connection(String),

    /// A provider operation finished in an error state.
    #[error("operation '{operation}' failed: {reason}")]
    OperationFailed {
        /// Name of the provider operation.
        operation: String,
        /// Error reported by the provider.
        reason: String,
    },

    /// The task's work panicked before producing a result.
    #[error("task '{task}' panicked: {reason}")]
    Panicked {
        /// Name of the task.
        task: String,
        /// Panic payload, when it was a string.
        reason: String,
    },

    /// A completion callback of the task panicked.
    #[error("completion callback of '{task}' panicked: {reason}")]
    CallbackPanicked {
        /// Name of the task.
        task: String,
        /// Panic payload, when it was a string.
        reason: String,
    },

    /// The task's work was cancelled before producing a result.
    #[error("task '{task}' was cancelled")]
    Cancelled {
        /// Name of the task.
        task: String,
    },
}

/// Opaque, shareable failure cause.
///
/// Wraps any `Error + Send + Sync` value behind an [`Arc`]. The source chain
/// of the wrapped error is preserved and can be walked with
/// [`root_cause`](Self::root_cause).
#[derive(Clone)]
pub struct TaskFailure(Arc<dyn Error + Send + Sync + 'static>);

impl TaskFailure {
    /// Wraps an error as a failure cause.
    pub fn new(error: impl Error + Send + Sync + 'static) -> Self {
        Self(Arc::new(error))
    }

    /// Wraps an already boxed error.
    #[must_use]
    pub fn from_boxed(error: Box<dyn Error + Send + Sync + 'static>) -> Self {
        Self(Arc::from(error))
    }

    /// Display string of the outermost error.
    #[must_use]
    pub fn message(&self) -> String {
        self.0.to_string()
    }

    /// The outermost error.
    #[must_use]
    pub fn error(&self) -> &(dyn Error + 'static) {
        &*self.0
    }

    /// Follows [`Error::source`] down to the innermost cause.
    #[must_use]
    pub fn root_cause(&self) -> &(dyn Error + 'static) {
        let mut current = self.error();
        while let Some(next) = current.source() {
            current = next;
        }
        current
    }

    /// Attempts to view the outermost error as a concrete type.
    #[must_use]
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.error().downcast_ref::<E>()
    }
}

impl fmt::Debug for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TaskFailure").field(&self.0).finish()
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<ProviderError> for TaskFailure {
    fn from(error: ProviderError) -> Self {
        Self::new(error)
    }
}
