//! BatchExtractor - atomically take the oldest entries off a queue.

use std::sync::Arc;

use tracing::{instrument, warn};

use crate::domain::{Batch, DispenserError, QueueName};
use crate::ports::QueueStore;
use crate::typed::codec;

/// Extracted batch plus how many entries were requested.
///
/// `requested` is what the tracker believed was available; the batch may be
/// shorter when that belief drifted above the store's real length.
#[derive(Debug)]
pub struct Extraction {
    pub batch: Batch,
    pub requested: usize,
}

pub struct BatchExtractor {
    store: Arc<dyn QueueStore>,
}

impl BatchExtractor {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self { store }
    }

    /// Remove and decode the `n` oldest entries of `queue`.
    ///
    /// The store removes exactly the entries it returns in one operation, so
    /// no two extractions can ever see the same entry.
    #[instrument(skip(self), fields(queue = %queue))]
    pub async fn extract(&self, queue: &QueueName, n: usize) -> Result<Extraction, DispenserError> {
        let raw = self.store.pop_oldest(queue, n).await?;

        if raw.len() > n {
            return Err(DispenserError::Invariant(format!(
                "store returned {} entries from {queue} for a request of {n}",
                raw.len()
            )));
        }
        if raw.len() < n {
            warn!(
                requested = n,
                extracted = raw.len(),
                "Queue held fewer items than estimated; notifications may have been lost"
            );
        }

        let items = raw
            .iter()
            .map(|entry| codec::decode(entry))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| DispenserError::Codec {
                queue: queue.clone(),
                source,
            })?;

        Ok(Extraction {
            batch: Batch::new(queue.clone(), items),
            requested: n,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::impls::InMemoryQueueStore;

    fn q(name: &str) -> QueueName {
        QueueName::new(name)
    }

    async fn store_with(values: &[serde_json::Value]) -> InMemoryQueueStore {
        let store = InMemoryQueueStore::new();
        for v in values {
            store.push(&q("q1"), codec::encode(v).unwrap()).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn extracts_oldest_in_publish_order() {
        let store = store_with(&[json!({"i": 0}), json!({"i": 1}), json!({"i": 2}), json!({"i": 3})]).await;
        let extractor = BatchExtractor::new(Arc::new(store.clone()));

        let extraction = extractor.extract(&q("q1"), 3).await.unwrap();

        assert_eq!(extraction.requested, 3);
        assert_eq!(
            extraction.batch.items(),
            &[json!({"i": 0}), json!({"i": 1}), json!({"i": 2})]
        );
        assert_eq!(store.contents(&q("q1")).await, vec![r#"{"i":3}"#]);
    }

    #[tokio::test]
    async fn consecutive_extractions_never_overlap() {
        let values: Vec<_> = (0..7).map(|i| json!(i)).collect();
        let store = store_with(&values).await;
        let extractor = BatchExtractor::new(Arc::new(store.clone()));

        let mut seen = Vec::new();
        for _ in 0..3 {
            let before = store.length(&q("q1")).await.unwrap();
            let extraction = extractor.extract(&q("q1"), 3).await.unwrap();
            let after = store.length(&q("q1")).await.unwrap();
            assert_eq!(before - after, extraction.batch.len());
            seen.extend(extraction.batch.into_items());
        }

        assert_eq!(seen, values);
    }

    #[tokio::test]
    async fn short_queue_yields_short_batch() {
        let store = store_with(&[json!("only")]).await;
        let extractor = BatchExtractor::new(Arc::new(store));

        let extraction = extractor.extract(&q("q1"), 5).await.unwrap();
        assert_eq!(extraction.requested, 5);
        assert_eq!(extraction.batch.len(), 1);
    }

    #[tokio::test]
    async fn undecodable_entry_is_a_codec_error() {
        let store = InMemoryQueueStore::new();
        store.push(&q("q1"), "not json".into()).await.unwrap();
        let extractor = BatchExtractor::new(Arc::new(store.clone()));

        let err = extractor.extract(&q("q1"), 1).await.unwrap_err();
        assert!(matches!(err, DispenserError::Codec { .. }));
        assert_eq!(store.length(&q("q1")).await.unwrap(), 0);
    }
}
