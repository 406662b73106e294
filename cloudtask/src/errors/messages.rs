//! Default message friendliness rules.

use cloudtask_types::{ProviderError, TaskFailure};

use super::ErrorMessageUpdater;

/// Passes messages through unchanged, except for empty messages and
/// unresolvable provider hosts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleErrorMessages;

impl ErrorMessageUpdater for SimpleErrorMessages {
    fn friendly_message_or(&self, message: &str, default: &str) -> String {
        if message.is_empty() {
            default.to_string()
        } else {
            message.to_string()
        }
    }

    fn friendly_failure_message_or(&self, cause: &TaskFailure, default: &str) -> String {
        // only the root cause is shown
        let root = cause.root_cause();
        if let Some(ProviderError::UnknownHost(host)) = root.downcast_ref::<ProviderError>() {
            return format!("Unknown host: {host}");
        }
        self.friendly_message_or(&root.to_string(), default)
    }
}
