//! Errors - what can go wrong while dispensing.
//!
//! # Taxonomy
//! - `StoreError`: store unreachable or protocol fault. Fatal, never retried.
//! - `TaskFailure`: a handler failed on one batch. Contained per batch and
//!   routed to the configured error policy.
//! - `Invariant`: a programming error (e.g. extracting more than is pending).
//! - `Interrupted`: operator interrupt. Always fatal, never wrapped.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::ids::{BatchId, QueueName};
use crate::ports::StoreError;

/// Error returned by a handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A handler error together with where it happened.
///
/// Produced only by the dispatcher, handed to the error policy, then dropped.
/// The failed batch has already been removed from the store.
#[derive(Debug, Error)]
#[error("task failed on queue {queue} (handler={handler}, {batch_id}, items={batch_len}): {source}")]
pub struct TaskFailure {
    pub queue: QueueName,
    pub handler: String,
    pub batch_id: BatchId,
    pub batch_len: usize,
    pub occurred_at: DateTime<Utc>,
    #[source]
    pub source: HandlerError,
}

impl TaskFailure {
    pub fn new(
        queue: QueueName,
        handler: impl Into<String>,
        batch_id: BatchId,
        batch_len: usize,
        source: HandlerError,
    ) -> Self {
        Self {
            queue,
            handler: handler.into(),
            batch_id,
            batch_len,
            occurred_at: Utc::now(),
            source,
        }
    }

    /// The original error followed by each of its causes, `: `-separated.
    pub fn error_chain(&self) -> String {
        let mut chain = self.source.to_string();
        let mut cause = self.source.source();
        while let Some(err) = cause {
            chain.push_str(": ");
            chain.push_str(&err.to_string());
            cause = err.source();
        }
        chain
    }
}

/// Fatal outcome of the dispensing loop.
#[derive(Debug, Error)]
pub enum DispenserError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    TaskFailed(Box<TaskFailure>),

    #[error("undecodable entry in queue {queue}: {source}")]
    Codec {
        queue: QueueName,
        #[source]
        source: serde_json::Error,
    },

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("interrupted by operator")]
    Interrupted,
}

impl From<TaskFailure> for DispenserError {
    fn from(failure: TaskFailure) -> Self {
        DispenserError::TaskFailed(Box::new(failure))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("outer")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn error_chain_walks_sources() {
        let inner = std::io::Error::other("disk full");
        let failure = TaskFailure::new(
            QueueName::new("q1"),
            "writer",
            BatchId::generate(),
            3,
            Box::new(Outer(inner)),
        );
        assert_eq!(failure.error_chain(), "outer: disk full");
        assert!(failure.to_string().contains("queue q1"));
        assert!(failure.to_string().contains("handler=writer"));
    }

    #[test]
    fn task_failure_converts_into_dispenser_error() {
        let failure = TaskFailure::new(
            QueueName::new("q1"),
            "h",
            BatchId::generate(),
            1,
            "boom".into(),
        );
        let err: DispenserError = failure.into();
        assert!(matches!(err, DispenserError::TaskFailed(f) if f.queue.as_str() == "q1"));
    }
}
