//! NotificationListener - bounded waits on the store subscription.

use std::time::Duration;

use crate::domain::StoreEvent;
use crate::ports::{StoreError, Subscription};

pub struct NotificationListener {
    subscription: Box<dyn Subscription>,
}

impl NotificationListener {
    pub fn new(subscription: Box<dyn Subscription>) -> Self {
        Self { subscription }
    }

    /// Wait for the next event.
    ///
    /// `timeout = None` blocks until an event arrives. Otherwise returns
    /// `Ok(None)` once `timeout` has elapsed without one. Events of every kind
    /// are returned; filtering is up to the caller. Cancel safe.
    pub async fn wait_for_event(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<Option<StoreEvent>, StoreError> {
        match timeout {
            None => self.subscription.next_event().await.map(Some),
            Some(timeout) => match tokio::time::timeout(timeout, self.subscription.next_event()).await {
                Ok(event) => event.map(Some),
                Err(_elapsed) => Ok(None),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QueueName;
    use crate::impls::InMemoryQueueStore;
    use crate::ports::QueueStore;

    #[tokio::test(start_paused = true)]
    async fn times_out_without_events() {
        let store = InMemoryQueueStore::new();
        let mut listener =
            NotificationListener::new(store.subscribe(&[QueueName::new("q1")]).await.unwrap());

        let start = tokio::time::Instant::now();
        let event = listener
            .wait_for_event(Some(Duration::from_secs(2)))
            .await
            .unwrap();

        assert!(event.is_none());
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_millis(2100));
    }

    #[tokio::test]
    async fn returns_pending_event_immediately() {
        let store = InMemoryQueueStore::new();
        let q1 = QueueName::new("q1");
        let mut listener = NotificationListener::new(store.subscribe(std::slice::from_ref(&q1)).await.unwrap());
        store.push(&q1, "1".into()).await.unwrap();

        let event = listener.wait_for_event(None).await.unwrap();
        assert_eq!(event, Some(StoreEvent::appended("q1")));
    }

    #[tokio::test]
    async fn closed_channel_is_an_error() {
        let store = InMemoryQueueStore::new();
        let mut listener =
            NotificationListener::new(store.subscribe(&[QueueName::new("q1")]).await.unwrap());
        store.close_subscriptions().await;

        let err = listener
            .wait_for_event(Some(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SubscriptionClosed));
    }
}
