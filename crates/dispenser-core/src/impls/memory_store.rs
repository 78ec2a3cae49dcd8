//! InMemoryQueueStore - development and test backing store.
//!
//! # Implementation notes
//! - One `VecDeque` per queue: `push_front` is the head, the tail is oldest.
//! - Every push is delivered to matching subscribers over an unbounded channel,
//!   which mirrors a keyspace notification.
//! - `push_silently` and `emit` let tests make the engine's estimate drift or
//!   feed it events that are not appends.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use crate::domain::{QueueName, StoreEvent};
use crate::ports::{QueueStore, StoreError, Subscription};

struct Subscriber {
    queues: HashSet<QueueName>,
    tx: mpsc::UnboundedSender<StoreEvent>,
}

#[derive(Default)]
struct InMemoryState {
    queues: HashMap<QueueName, VecDeque<String>>,
    subscribers: Vec<Subscriber>,
}

impl InMemoryState {
    fn push(&mut self, queue: &QueueName, value: String) -> u64 {
        let list = self.queues.entry(queue.clone()).or_default();
        list.push_front(value);
        list.len() as u64
    }

    fn notify(&mut self, event: StoreEvent) {
        // 受信側が drop 済みの subscriber はここで掃除する
        self.subscribers.retain(|sub| {
            if !sub.queues.contains(&event.queue) {
                return !sub.tx.is_closed();
            }
            sub.tx.send(event.clone()).is_ok()
        });
    }
}

/// List store kept in process memory. Cloning shares the same contents.
#[derive(Clone, Default)]
pub struct InMemoryQueueStore {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push without emitting a notification.
    pub async fn push_silently(&self, queue: &QueueName, value: String) -> u64 {
        let mut state = self.state.lock().await;
        state.push(queue, value)
    }

    /// Deliver an arbitrary event to subscribers without touching any queue.
    pub async fn emit(&self, event: StoreEvent) {
        let mut state = self.state.lock().await;
        state.notify(event);
    }

    /// Drop every open subscription, as if the connection went away.
    pub async fn close_subscriptions(&self) {
        let mut state = self.state.lock().await;
        state.subscribers.clear();
    }

    /// Snapshot of a queue, oldest entry first.
    pub async fn contents(&self, queue: &QueueName) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .queues
            .get(queue)
            .map(|list| list.iter().rev().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn push(&self, queue: &QueueName, value: String) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let len = state.push(queue, value);
        state.notify(StoreEvent::appended(queue.clone()));
        Ok(len)
    }

    async fn pop_oldest(&self, queue: &QueueName, n: usize) -> Result<Vec<String>, StoreError> {
        let mut state = self.state.lock().await;
        let Some(list) = state.queues.get_mut(queue) else {
            return Ok(Vec::new());
        };
        let mut items = Vec::with_capacity(n.min(list.len()));
        while items.len() < n {
            match list.pop_back() {
                Some(item) => items.push(item),
                None => break,
            }
        }
        Ok(items)
    }

    async fn length(&self, queue: &QueueName) -> Result<usize, StoreError> {
        let state = self.state.lock().await;
        Ok(state.queues.get(queue).map_or(0, VecDeque::len))
    }

    async fn subscribe(&self, queues: &[QueueName]) -> Result<Box<dyn Subscription>, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock().await;
        state.subscribers.push(Subscriber {
            queues: queues.iter().cloned().collect(),
            tx,
        });
        Ok(Box::new(InMemorySubscription { rx }))
    }
}

struct InMemorySubscription {
    rx: mpsc::UnboundedReceiver<StoreEvent>,
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn next_event(&mut self) -> Result<StoreEvent, StoreError> {
        self.rx.recv().await.ok_or(StoreError::SubscriptionClosed)
    }
}
