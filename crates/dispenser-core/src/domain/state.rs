//! Per-queue scheduling state.

use tokio::time::Instant;

/// What the engine believes about one queue.
///
/// `pending_count` is an estimate: it is exact after bootstrap and after each
/// extraction, and in between it only moves on append notifications. It is
/// never re-read from the store mid-run.
///
/// Invariant: `next_flush_deadline.is_none() == (pending_count == 0)`, except
/// when `pending_count >= batch_size` right after an under-extraction, where
/// the deadline is cleared and the size threshold drives the next flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueState {
    pub pending_count: usize,
    pub next_flush_deadline: Option<Instant>,
}

impl QueueState {
    pub fn is_empty(&self) -> bool {
        self.pending_count == 0
    }
}

/// Why a queue was flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// At least `batch_size` items are pending.
    BatchSize,

    /// The flush deadline has been reached.
    Timeout,
}

impl FlushReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FlushReason::BatchSize => "batch_size",
            FlushReason::Timeout => "timeout",
        }
    }
}
