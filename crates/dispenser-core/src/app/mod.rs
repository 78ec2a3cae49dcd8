//! App - the dispensing engine, assembled from ports.
//!
//! # Components
//! - **DeadlineTracker**: per-queue pending estimate and flush deadline
//! - **NotificationListener**: bounded wait on the store subscription
//! - **BatchExtractor**: atomic removal of the oldest entries
//! - **Dispatcher** / **WorkerPool**: inline or pooled handler execution
//! - **ErrorPolicy**: what a handler failure does to the loop
//! - **Dispenser**: the loop tying them together
//! - **DispenserClient**: producer side

pub mod builder;
pub mod client;
pub mod deadline;
pub mod dispatcher;
pub mod engine;
pub mod error_policy;
pub mod extractor;
pub mod listener;
pub mod worker_pool;

pub use self::builder::{BuildError, DispenserBuilder};
pub use self::client::DispenserClient;
pub use self::deadline::DeadlineTracker;
pub use self::dispatcher::Dispatcher;
pub use self::engine::Dispenser;
pub use self::error_policy::ErrorPolicy;
pub use self::extractor::{BatchExtractor, Extraction};
pub use self::listener::NotificationListener;
pub use self::worker_pool::WorkerPool;
