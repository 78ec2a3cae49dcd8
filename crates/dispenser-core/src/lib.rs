//! dispenser-core
//!
//! Batching task dispenser: producers push JSON arguments onto named queues
//! in a shared store, and a single dispenser drains each queue into batches
//! bounded by size and by wait time.
//!
//! # Modules
//! - **domain**: queue names, batches, per-queue state, errors
//! - **ports**: `QueueStore` / `Subscription` / `Clock`
//! - **app**: deadline tracking, extraction, dispatch, the engine loop
//! - **typed**: handler traits, registry, payload codec
//! - **impls**: in-memory store for tests and development
//! - **config**: process configuration

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod typed;

pub use app::{BuildError, Dispenser, DispenserBuilder, DispenserClient, ErrorPolicy};
pub use config::{ConfigError, DispenserConfig, ErrorPolicyKind, StoreSettings};
pub use domain::{Batch, BatchSettings, DispenserError, HandlerError, QueueName, QueueSpec, TaskFailure};
pub use ports::{QueueStore, StoreError, Subscription};
pub use typed::{BatchHandler, Handler, HandlerRegistry, TypedHandler, handler_fn};
