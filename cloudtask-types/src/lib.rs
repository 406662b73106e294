//! Shared value types for cloud task execution and error reporting.

pub mod error_info;
pub mod failure;
pub mod result;

pub use error_info::{CloudErrorInfo, CloudErrorType, TypedErrorInfo};
pub use failure::{ProviderError, TaskFailure};
pub use result::{TaskId, TaskResult};
