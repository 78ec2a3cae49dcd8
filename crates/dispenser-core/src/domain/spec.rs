//! Queue specs: what the engine was asked to serve.

use std::sync::Arc;
use std::time::Duration;

use super::ids::QueueName;
use crate::typed::BatchHandler;

/// One configured queue and its handler. Immutable after construction.
#[derive(Clone)]
pub struct QueueSpec {
    pub name: QueueName,
    pub handler: Arc<dyn BatchHandler>,
}

impl QueueSpec {
    pub fn new(name: impl Into<QueueName>, handler: Arc<dyn BatchHandler>) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

impl std::fmt::Debug for QueueSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueSpec")
            .field("name", &self.name)
            .field("handler", &self.handler.name())
            .finish()
    }
}

/// Flush thresholds shared by every queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    /// Number of pending items that forces a flush.
    pub batch_size: usize,

    /// Longest time a non-empty queue waits below `batch_size`.
    pub flush_interval: Duration,
}

impl BatchSettings {
    /// Longest accepted `flush_interval`. Deadlines are `now + flush_interval`
    /// and must stay representable as an `Instant`.
    pub const MAX_FLUSH_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

    pub fn new(batch_size: usize, flush_interval: Duration) -> Self {
        Self {
            batch_size,
            flush_interval,
        }
    }
}
