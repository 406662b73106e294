//! Reported provider errors and the aggregated error snapshot.
//!
//! A [`TypedErrorInfo`] is one reported error, keyed by a stable type so that
//! repeated reports of the same condition overwrite rather than accumulate.
//! A [`CloudErrorInfo`] is the single user-facing report derived from the
//! current set of typed errors.

use serde::Serialize;

use crate::failure::TaskFailure;

/// Categories of provider errors with stable keys and message patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloudErrorType {
    /// An instance could not be started.
    InstanceCannotStart,
    /// An instance could not be stopped.
    InstanceCannotStop,
    /// The source virtual machine of an image does not exist.
    ImageNotExists,
    /// The source image could not be cloned.
    ImageCannotClone,
    /// The configured snapshot of an image does not exist.
    ImageSnapshotNotExists,
    /// Any other provider error.
    Custom,
}

impl CloudErrorType {
    /// Stable key used as the error slot in the error map.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::InstanceCannotStart => "instance_cannot_start",
            Self::InstanceCannotStop => "instance_cannot_stop",
            Self::ImageNotExists => "image_not_exists",
            Self::ImageCannotClone => "image_cannot_clone",
            Self::ImageSnapshotNotExists => "image_snapshot_not_exists",
            Self::Custom => "custom",
        }
    }

    /// Formats the category description for a VM and snapshot name.
    #[must_use]
    pub fn describe(self, name: &str, snapshot: &str) -> String {
        match self {
            Self::InstanceCannotStart => format!("Cannot start instance {name}@{snapshot}"),
            Self::InstanceCannotStop => format!("Cannot stop instance {name}@{snapshot}"),
            Self::ImageNotExists => format!("Virtual machine {name} doesn't exist"),
            Self::ImageCannotClone => format!("Cannot clone image {name}@{snapshot}"),
            Self::ImageSnapshotNotExists => format!("Cannot find snapshot {name}@{snapshot}"),
            Self::Custom => format!("Unknown error {name}@{snapshot}"),
        }
    }
}

impl std::fmt::Display for CloudErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// One reported error: a type key, a message, details and an optional cause.
///
/// Immutable once built; use the consuming `with_*` builders while
/// constructing.
#[derive(Debug, Clone)]
pub struct TypedErrorInfo {
    error_type: String,
    message: String,
    details: String,
    cause: Option<TaskFailure>,
}

impl TypedErrorInfo {
    /// Creates an error with empty details and no cause.
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            details: String::new(),
            cause: None,
        }
    }

    /// Creates an error for a known category, using the category key as the
    /// type and its formatted description as the message.
    #[must_use]
    pub fn from_type(kind: CloudErrorType, name: &str, snapshot: &str) -> Self {
        Self::new(kind.key(), kind.describe(name, snapshot))
    }

    /// Creates an error whose message and details come from a failure cause.
    #[must_use]
    pub fn from_failure(error_type: impl Into<String>, cause: TaskFailure) -> Self {
        let message = cause.message();
        Self::new(error_type, message.clone())
            .with_details(message)
            .with_cause(cause)
    }

    /// Sets the details text.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    /// Attaches a failure cause.
    #[must_use]
    pub fn with_cause(mut self, cause: TaskFailure) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Stable key identifying the error category or source.
    #[must_use]
    pub fn error_type(&self) -> &str {
        &self.error_type
    }

    /// Raw error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Error details.
    #[must_use]
    pub fn details(&self) -> &str {
        &self.details
    }

    /// Failure cause, if one was attached.
    #[must_use]
    pub const fn cause(&self) -> Option<&TaskFailure> {
        self.cause.as_ref()
    }
}

/// The aggregated, user-facing error snapshot.
///
/// Always replaced as a whole, never updated in place.
#[derive(Debug, Clone, Serialize)]
pub struct CloudErrorInfo {
    /// Friendly, operator-readable message.
    pub message: String,
    /// Detailed description.
    pub details: String,
    /// Failure cause, carried only for single-error snapshots.
    #[serde(skip)]
    pub cause: Option<TaskFailure>,
}

impl CloudErrorInfo {
    /// Creates a snapshot without a cause.
    pub fn new(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: details.into(),
            cause: None,
        }
    }

    /// Creates a snapshot carrying a failure cause.
    pub fn with_cause(
        message: impl Into<String>,
        details: impl Into<String>,
        cause: TaskFailure,
    ) -> Self {
        Self {
            message: message.into(),
            details: details.into(),
            cause: Some(cause),
        }
    }
}

impl PartialEq for CloudErrorInfo {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message
            && self.details == other.details
            && self.cause.as_ref().map(TaskFailure::message)
                == other.cause.as_ref().map(TaskFailure::message)
    }
}
