//! dispenser-redis
//!
//! Redis-backed `QueueStore`. Queues are Redis lists; arrivals are observed
//! through keyspace notifications on the list keys.

mod keyspace;
mod store;

pub use keyspace::{KeyspaceChannel, merge_notify_flags};
pub use store::{RedisQueueStore, RedisSubscription};
