//! Domain model (queue names, specs, state, batches, events, errors).

pub mod batch;
pub mod errors;
pub mod events;
pub mod ids;
pub mod spec;
pub mod state;

pub use batch::Batch;
pub use errors::{DispenserError, HandlerError, TaskFailure};
pub use events::{EventKind, StoreEvent};
pub use ids::{BatchId, QueueName};
pub use spec::{BatchSettings, QueueSpec};
pub use state::{FlushReason, QueueState};
