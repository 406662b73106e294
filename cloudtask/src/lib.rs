//! Cloud task execution and error aggregation.
//!
//! [`tasks`] runs long provider operations off the caller's thread and
//! delivers completion callbacks exactly once. [`errors`] collapses the
//! typed errors reported by those operations into one status snapshot.

pub mod errors;
pub mod tasks;

pub use cloudtask_types::{
    CloudErrorInfo, CloudErrorType, ProviderError, TaskFailure, TaskId, TaskResult,
    TypedErrorInfo,
};
