//! Ports - the seams between the engine and the outside world.
//!
//! The backing store is the source of truth for queue contents; the engine
//! only keeps an estimate of each queue's length.

pub mod clock;
pub mod store;

pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::store::{QueueStore, StoreError, Subscription};
