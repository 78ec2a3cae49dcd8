//! DispenserClient - producer side: encode arguments and push them.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::domain::{DispenserError, QueueName};
use crate::ports::QueueStore;
use crate::typed::codec;

#[derive(Clone)]
pub struct DispenserClient {
    store: Arc<dyn QueueStore>,
}

impl DispenserClient {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self { store }
    }

    /// Enqueue one task's arguments. Returns the queue length after the push.
    pub async fn add<T: Serialize + ?Sized>(
        &self,
        queue: impl Into<QueueName>,
        args: &T,
    ) -> Result<u64, DispenserError> {
        let queue = queue.into();
        let entry = codec::encode(args).map_err(|source| DispenserError::Codec {
            queue: queue.clone(),
            source,
        })?;
        let len = self.store.push(&queue, entry).await?;
        debug!(queue = %queue, len, "Task added");
        Ok(len)
    }
}
