//! DispenserBuilder - 構築とワイヤリング
//!
//! Every problem is reported by `build()`, before the engine subscribes to
//! anything: no queues, a queue configured twice, zero batch size, a flush
//! interval that is zero or beyond `BatchSettings::MAX_FLUSH_INTERVAL`, no
//! store.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::deadline::DeadlineTracker;
use super::dispatcher::Dispatcher;
use super::engine::Dispenser;
use super::error_policy::ErrorPolicy;
use crate::config::{ConfigError, DispenserConfig};
use crate::domain::{BatchSettings, QueueName, QueueSpec};
use crate::ports::{Clock, QueueStore, SystemClock};
use crate::typed::BatchHandler;

/// Builds a [`Dispenser`].
///
/// # Example
/// ```ignore
/// let dispenser = DispenserBuilder::new(BatchSettings::new(20, Duration::from_secs(5)))
///     .queue("emails", Arc::new(SendEmails))
///     .store(Arc::new(store))
///     .error_policy(ErrorPolicy::Log)
///     .workers(4)
///     .build()?;
/// ```
pub struct DispenserBuilder {
    settings: BatchSettings,
    queues: Vec<QueueSpec>,
    store: Option<Arc<dyn QueueStore>>,
    clock: Arc<dyn Clock>,
    policy: ErrorPolicy,
    workers: usize,
    pool_queue_capacity: Option<usize>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no queues configured")]
    NoQueues,

    #[error("queue {0} configured more than once")]
    DuplicateQueue(QueueName),

    #[error("batch size must be positive")]
    InvalidBatchSize,

    #[error("flush interval must be positive and at most one year")]
    InvalidFlushInterval,

    #[error("no queue store configured")]
    MissingStore,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl DispenserBuilder {
    /// Inline dispatch, `fail` policy, system clock.
    pub fn new(settings: BatchSettings) -> Self {
        Self {
            settings,
            queues: Vec::new(),
            store: None,
            clock: Arc::new(SystemClock),
            policy: ErrorPolicy::default(),
            workers: 0,
            pool_queue_capacity: None,
        }
    }

    /// Settings, worker count and error policy taken from `config`.
    pub fn from_config(config: &DispenserConfig) -> Result<Self, BuildError> {
        let builder = Self::new(config.batch_settings()?)
            .workers(config.workers)
            .pool_queue_capacity(config.pool_queue_capacity())
            .error_policy(config.on_error.into());
        Ok(builder)
    }

    pub fn queue(mut self, name: impl Into<QueueName>, handler: Arc<dyn BatchHandler>) -> Self {
        self.queues.push(QueueSpec::new(name, handler));
        self
    }

    pub fn queues(mut self, specs: impl IntoIterator<Item = QueueSpec>) -> Self {
        self.queues.extend(specs);
        self
    }

    pub fn store(mut self, store: Arc<dyn QueueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// `0` runs handlers inline on the engine loop.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Batches that may wait for a free worker before `dispatch` blocks.
    pub fn pool_queue_capacity(mut self, capacity: usize) -> Self {
        self.pool_queue_capacity = Some(capacity);
        self
    }

    /// Validate and wire everything together.
    ///
    /// With `workers > 0` the pool's tasks are spawned here, so this must be
    /// called from within a Tokio runtime.
    pub fn build(self) -> Result<Dispenser, BuildError> {
        if self.settings.batch_size == 0 {
            return Err(BuildError::InvalidBatchSize);
        }
        if self.settings.flush_interval == Duration::ZERO
            || self.settings.flush_interval > BatchSettings::MAX_FLUSH_INTERVAL
        {
            return Err(BuildError::InvalidFlushInterval);
        }
        if self.queues.is_empty() {
            return Err(BuildError::NoQueues);
        }

        let mut queues = BTreeMap::new();
        for spec in self.queues {
            if queues.contains_key(&spec.name) {
                return Err(BuildError::DuplicateQueue(spec.name));
            }
            queues.insert(spec.name.clone(), spec);
        }

        let store = self.store.ok_or(BuildError::MissingStore)?;

        let capacity = self
            .pool_queue_capacity
            .unwrap_or(self.workers.saturating_mul(2))
            .max(1);
        let dispatcher = Dispatcher::with_workers(self.workers, capacity, self.policy);
        let tracker = DeadlineTracker::new(queues.keys().cloned(), self.settings);

        Ok(Dispenser::from_parts(queues, store, self.clock, tracker, dispatcher))
    }
}

impl Dispenser {
    pub fn builder(settings: BatchSettings) -> DispenserBuilder {
        DispenserBuilder::new(settings)
    }

    /// Build from process configuration, resolving one handler per queue.
    pub fn from_config(
        config: &DispenserConfig,
        queues: impl IntoIterator<Item = QueueSpec>,
        store: Arc<dyn QueueStore>,
    ) -> Result<Self, BuildError> {
        DispenserBuilder::from_config(config)?
            .queues(queues)
            .store(store)
            .build()
    }
}
