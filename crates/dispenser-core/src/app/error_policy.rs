//! ErrorPolicy - what happens to a `TaskFailure`.
//!
//! Selected by identifier in configuration (`fail` | `log`) or supplied as a
//! callback by library users. Passed into the engine explicitly; there is no
//! process-wide default.

use std::fmt;
use std::sync::Arc;

use tracing::error;

use crate::config::ErrorPolicyKind;
use crate::domain::{DispenserError, TaskFailure};

type FailureCallback = dyn Fn(&TaskFailure) + Send + Sync;

#[derive(Clone, Default)]
pub enum ErrorPolicy {
    /// Turn the failure into a fatal error, ending the loop.
    #[default]
    Fail,

    /// Record the failure and continue.
    Log,

    /// Hand the failure to a callback and continue.
    Custom(Arc<FailureCallback>),
}

impl ErrorPolicy {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&TaskFailure) + Send + Sync + 'static,
    {
        ErrorPolicy::Custom(Arc::new(f))
    }

    pub fn apply(&self, failure: TaskFailure) -> Result<(), DispenserError> {
        match self {
            ErrorPolicy::Fail => Err(failure.into()),
            ErrorPolicy::Log => {
                error!(
                    queue = %failure.queue,
                    handler = %failure.handler,
                    batch_id = %failure.batch_id,
                    batch_len = failure.batch_len,
                    occurred_at = %failure.occurred_at,
                    error = %failure.error_chain(),
                    "Error while executing task"
                );
                Ok(())
            }
            ErrorPolicy::Custom(callback) => {
                callback(&failure);
                Ok(())
            }
        }
    }
}

impl From<ErrorPolicyKind> for ErrorPolicy {
    fn from(kind: ErrorPolicyKind) -> Self {
        match kind {
            ErrorPolicyKind::Fail => ErrorPolicy::Fail,
            ErrorPolicyKind::Log => ErrorPolicy::Log,
        }
    }
}

impl fmt::Debug for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorPolicy::Fail => f.write_str("Fail"),
            ErrorPolicy::Log => f.write_str("Log"),
            ErrorPolicy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::domain::{BatchId, QueueName};

    fn failure() -> TaskFailure {
        TaskFailure::new(QueueName::new("q1"), "h", BatchId::generate(), 2, "boom".into())
    }

    #[test]
    fn fail_policy_escalates() {
        let err = ErrorPolicy::Fail.apply(failure()).unwrap_err();
        assert!(matches!(err, DispenserError::TaskFailed(f) if f.batch_len == 2));
    }

    #[test]
    fn log_policy_continues() {
        assert!(ErrorPolicy::Log.apply(failure()).is_ok());
    }

    #[test]
    fn custom_policy_sees_every_failure() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let policy = ErrorPolicy::custom(move |f: &TaskFailure| {
            assert_eq!(f.queue.as_str(), "q1");
            seen.fetch_add(1, Ordering::SeqCst);
        });

        policy.apply(failure()).unwrap();
        policy.apply(failure()).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn built_from_kind() {
        assert!(matches!(ErrorPolicy::from(ErrorPolicyKind::Log), ErrorPolicy::Log));
        assert!(matches!(ErrorPolicy::from(ErrorPolicyKind::Fail), ErrorPolicy::Fail));
    }
}
