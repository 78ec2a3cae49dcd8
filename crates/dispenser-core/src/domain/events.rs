//! Store-side notifications.

use super::ids::QueueName;

/// Store-level operation reported by a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// An item was pushed onto the queue.
    Appended,

    /// Any other operation on the key (trim, delete, expire, ...).
    Other(String),
}

/// A notification delivered over the store subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    pub queue: QueueName,
    pub kind: EventKind,
}

impl StoreEvent {
    pub fn appended(queue: impl Into<QueueName>) -> Self {
        Self {
            queue: queue.into(),
            kind: EventKind::Appended,
        }
    }

    pub fn other(queue: impl Into<QueueName>, op: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            kind: EventKind::Other(op.into()),
        }
    }

    pub fn is_append(&self) -> bool {
        self.kind == EventKind::Appended
    }
}
