//! Dispatcher - hand a batch to its handler.
//!
//! # Modes
//! - **Inline**: the handler runs on the engine loop. A failure is wrapped in
//!   a `TaskFailure` and passed to the error policy before `dispatch` returns.
//!   A slow handler blocks every queue.
//! - **Pooled**: the batch goes to a `WorkerPool` and `dispatch` returns once
//!   it is queued. Failures arrive later through `next_failure` and go to the
//!   same policy.

use std::sync::Arc;

use tracing::debug;

use super::error_policy::ErrorPolicy;
use super::worker_pool::WorkerPool;
use crate::domain::{Batch, DispenserError, TaskFailure};
use crate::typed::BatchHandler;

enum Mode {
    Inline,
    Pooled(WorkerPool),
}

pub struct Dispatcher {
    mode: Mode,
    policy: ErrorPolicy,
}

impl Dispatcher {
    pub fn inline(policy: ErrorPolicy) -> Self {
        Self {
            mode: Mode::Inline,
            policy,
        }
    }

    pub fn pooled(pool: WorkerPool, policy: ErrorPolicy) -> Self {
        Self {
            mode: Mode::Pooled(pool),
            policy,
        }
    }

    /// `0` workers means inline.
    pub fn with_workers(workers: usize, capacity: usize, policy: ErrorPolicy) -> Self {
        if workers == 0 {
            Self::inline(policy)
        } else {
            Self::pooled(WorkerPool::spawn(workers, capacity), policy)
        }
    }

    /// Worker count; `0` when handlers run inline.
    pub fn workers(&self) -> usize {
        match &self.mode {
            Mode::Inline => 0,
            Mode::Pooled(pool) => pool.size(),
        }
    }

    pub fn policy(&self) -> &ErrorPolicy {
        &self.policy
    }

    pub async fn dispatch(
        &mut self,
        handler: &Arc<dyn BatchHandler>,
        batch: Batch,
    ) -> Result<(), DispenserError> {
        match &self.mode {
            Mode::Inline => {
                let queue = batch.queue().clone();
                let batch_id = batch.id();
                let batch_len = batch.len();
                match handler.handle(batch).await {
                    Ok(()) => {
                        debug!(queue = %queue, batch_id = %batch_id, batch_len, "Batch done");
                        Ok(())
                    }
                    Err(source) => self.report(TaskFailure::new(
                        queue,
                        handler.name(),
                        batch_id,
                        batch_len,
                        source,
                    )),
                }
            }
            Mode::Pooled(pool) => pool.submit(Arc::clone(handler), batch).await,
        }
    }

    /// Next failure from the pool. Never resolves in inline mode. Cancel safe.
    pub async fn next_failure(&mut self) -> Option<TaskFailure> {
        match &mut self.mode {
            Mode::Inline => std::future::pending().await,
            Mode::Pooled(pool) => pool.next_failure().await,
        }
    }

    /// Apply the error policy.
    pub fn report(&self, failure: TaskFailure) -> Result<(), DispenserError> {
        self.policy.apply(failure)
    }

    /// Wait for pooled work to drain, reporting failures not yet collected.
    pub async fn shutdown(self) -> Result<(), DispenserError> {
        let Dispatcher { mode, policy } = self;
        if let Mode::Pooled(pool) = mode {
            for failure in pool.shutdown_and_join().await {
                policy.apply(failure)?;
            }
        }
        Ok(())
    }
}
