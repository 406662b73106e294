//! Aggregation of reported provider errors into one status snapshot.
//!
//! Components that observe provider problems report batches of
//! [`TypedErrorInfo`](cloudtask_types::TypedErrorInfo) into a
//! [`CloudErrorMap`]; status readers fetch the resulting
//! [`CloudErrorInfo`](cloudtask_types::CloudErrorInfo). Messages pass
//! through an [`ErrorMessageUpdater`] to become operator-readable.

pub mod map;
pub mod messages;

pub use map::CloudErrorMap;
pub use messages::SimpleErrorMessages;

use cloudtask_types::TaskFailure;

/// Converts raw error text or failure causes into friendlier messages.
pub trait ErrorMessageUpdater: Send + Sync {
    /// Friendly form of `message`, or `default` when nothing better exists.
    fn friendly_message_or(&self, message: &str, default: &str) -> String;

    /// Friendly form of `cause`, looking through to its root cause.
    fn friendly_failure_message_or(&self, cause: &TaskFailure, default: &str) -> String;

    /// Friendly form of `message`, falling back to the message itself.
    fn friendly_message(&self, message: &str) -> String {
        self.friendly_message_or(message, message)
    }

    /// Friendly form of `cause`, falling back to its own message.
    fn friendly_failure_message(&self, cause: &TaskFailure) -> String {
        self.friendly_failure_message_or(cause, &cause.message())
    }
}
