//! Batch: the unit handed to a handler.

use serde_json::Value;

use super::ids::{BatchId, QueueName};

/// An ordered run of decoded task arguments extracted from one queue in a
/// single atomic operation.
///
/// Items are ordered oldest push first. A batch is never longer than the
/// configured batch size and is discarded once dispatched.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    id: BatchId,
    queue: QueueName,
    items: Vec<Value>,
}

impl Batch {
    pub fn new(queue: QueueName, items: Vec<Value>) -> Self {
        Self {
            id: BatchId::generate(),
            queue,
            items,
        }
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn queue(&self) -> &QueueName {
        &self.queue
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Value> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl IntoIterator for Batch {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
