//! DeadlineTracker - per-queue pending counts and flush deadlines.
//!
//! This is an explicit cache over the store. `pending_count` is exact only at
//! bootstrap (`reconcile`) and after an extraction (exact arithmetic); between
//! those points it moves one step per append notification. If notifications
//! are lost the estimate drifts and nothing corrects it until the next
//! reconcile. `override_pending` exists so that drift can be injected in tests.
//!
//! All methods take `now` explicitly; the tracker never reads a clock.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::domain::{BatchSettings, DispenserError, FlushReason, QueueName, QueueState};

#[derive(Debug)]
pub struct DeadlineTracker {
    settings: BatchSettings,
    states: BTreeMap<QueueName, QueueState>,
}

impl DeadlineTracker {
    pub fn new(queues: impl IntoIterator<Item = QueueName>, settings: BatchSettings) -> Self {
        Self {
            settings,
            states: queues
                .into_iter()
                .map(|name| (name, QueueState::default()))
                .collect(),
        }
    }

    pub fn settings(&self) -> BatchSettings {
        self.settings
    }

    pub fn state(&self, queue: &QueueName) -> Option<&QueueState> {
        self.states.get(queue)
    }

    pub fn pending(&self, queue: &QueueName) -> usize {
        self.states.get(queue).map_or(0, |s| s.pending_count)
    }

    /// Replace the estimate with the store's true length.
    pub fn reconcile(&mut self, queue: &QueueName, true_len: usize, now: Instant) -> bool {
        let flush_interval = self.settings.flush_interval;
        let Some(state) = self.states.get_mut(queue) else {
            return false;
        };
        state.pending_count = true_len;
        state.next_flush_deadline = (true_len > 0).then(|| now + flush_interval);
        true
    }

    /// One item was appended. Returns `false` for queues we do not track.
    pub fn record_arrival(&mut self, queue: &QueueName, now: Instant) -> bool {
        let flush_interval = self.settings.flush_interval;
        let Some(state) = self.states.get_mut(queue) else {
            return false;
        };
        if state.pending_count == 0 {
            state.next_flush_deadline = Some(now + flush_interval);
        }
        state.pending_count += 1;
        true
    }

    /// `removed` items were extracted. Returns how many remain pending.
    pub fn record_extraction(
        &mut self,
        queue: &QueueName,
        removed: usize,
        now: Instant,
    ) -> Result<usize, DispenserError> {
        let settings = self.settings;
        let state = self
            .states
            .get_mut(queue)
            .ok_or_else(|| DispenserError::Invariant(format!("extraction from untracked queue {queue}")))?;

        let remaining = state.pending_count.checked_sub(removed).ok_or_else(|| {
            DispenserError::Invariant(format!(
                "extracted {removed} items from {queue} with only {} pending",
                state.pending_count
            ))
        })?;
        state.pending_count = remaining;

        state.next_flush_deadline = if remaining > 0 && remaining < settings.batch_size {
            Some(now + settings.flush_interval)
        } else {
            // empty, or still a full batch left which the size rule picks up next pass
            None
        };
        Ok(remaining)
    }

    /// Why `queue` must be flushed now, if it must.
    pub fn flush_reason(&self, queue: &QueueName, now: Instant) -> Option<FlushReason> {
        let state = self.states.get(queue)?;
        if state.is_empty() {
            return None;
        }
        if state.pending_count >= self.settings.batch_size {
            return Some(FlushReason::BatchSize);
        }
        match state.next_flush_deadline {
            Some(deadline) if now >= deadline => Some(FlushReason::Timeout),
            _ => None,
        }
    }

    pub fn any_due(&self, now: Instant) -> bool {
        self.states
            .keys()
            .any(|queue| self.flush_reason(queue, now).is_some())
    }

    /// How long the loop may block before some queue must be re-evaluated.
    ///
    /// `None` means no queue has a deadline: wait for notifications forever.
    /// A deadline already in the past yields `Duration::ZERO`, never a
    /// negative wait.
    pub fn next_wait(&self, now: Instant) -> Option<Duration> {
        self.states
            .values()
            .filter_map(|state| state.next_flush_deadline)
            .min()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Force the estimate for `queue` without touching its deadline rule.
    ///
    /// Simulates drift between the cache and the store.
    pub fn override_pending(&mut self, queue: &QueueName, pending: usize, now: Instant) {
        let flush_interval = self.settings.flush_interval;
        if let Some(state) = self.states.get_mut(queue) {
            state.pending_count = pending;
            if pending == 0 {
                state.next_flush_deadline = None;
            } else if state.next_flush_deadline.is_none() {
                state.next_flush_deadline = Some(now + flush_interval);
            }
        }
    }
}
