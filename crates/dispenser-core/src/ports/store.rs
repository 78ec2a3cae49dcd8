//! QueueStore port - the backing store holding queue contents.
//!
//! The store is the only source of truth for what is queued. Values are
//! opaque strings here; (de)serialization belongs to `typed::codec`.
//!
//! # List semantics
//! - `push` appends at the head of the list.
//! - `pop_oldest` atomically reads and removes up to `n` entries from the
//!   tail, returning them oldest first.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{QueueName, StoreEvent};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Connection(String),

    #[error("store command failed: {0}")]
    Command(String),

    #[error("notification subscription closed")]
    SubscriptionClosed,
}

/// Queue primitives over the backing store.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Append `value` to the queue, returning the new queue length.
    async fn push(&self, queue: &QueueName, value: String) -> Result<u64, StoreError>;

    /// Remove and return the `n` oldest entries in one indivisible operation.
    ///
    /// Returns fewer than `n` entries only when the queue holds fewer.
    async fn pop_oldest(&self, queue: &QueueName, n: usize) -> Result<Vec<String>, StoreError>;

    /// Exact queue length.
    async fn length(&self, queue: &QueueName) -> Result<usize, StoreError>;

    /// Start receiving notifications for the given queues.
    async fn subscribe(&self, queues: &[QueueName]) -> Result<Box<dyn Subscription>, StoreError>;
}

/// An open notification channel.
///
/// Assumed reliable and in order for the lifetime of the connection. Events
/// lost by the transport are not recovered.
#[async_trait]
pub trait Subscription: Send {
    /// Wait for the next event. Must be cancel safe.
    async fn next_event(&mut self) -> Result<StoreEvent, StoreError>;
}
