//! Impls - in-process implementations of the ports.
//!
//! The production Redis store lives in the `dispenser-redis` crate.

pub mod memory_store;

pub use self::memory_store::InMemoryQueueStore;
