//! Dispenser - the engine loop.
//!
//! # States
//! 1. **Bootstrapping**: subscribe, then read every queue's true length once
//!    and arm deadlines for the non-empty ones.
//! 2. **Waiting**: block on the subscription for at most `next_wait`, or
//!    forever when nothing is pending. The only suspension point besides
//!    handler execution.
//! 3. **Reconciling**: an append event bumps that queue's estimate; any other
//!    event is ignored.
//! 4. **Evaluating**: every queue, in name order, is flushed if it holds a
//!    full batch or its deadline has been reached.
//!
//! The loop ends only on a store error, a fatal handler failure (`fail`
//! policy) or an operator interrupt. Items still queued stay in the store.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use super::deadline::DeadlineTracker;
use super::dispatcher::Dispatcher;
use super::extractor::{BatchExtractor, Extraction};
use super::listener::NotificationListener;
use crate::domain::{DispenserError, QueueName, QueueSpec, StoreEvent, TaskFailure};
use crate::ports::{Clock, QueueStore, StoreError};

/// What ended a wait.
enum Wake {
    Interrupted,
    Failure(Option<TaskFailure>),
    Event(Result<Option<StoreEvent>, StoreError>),
}

pub struct Dispenser {
    queues: BTreeMap<QueueName, QueueSpec>,
    store: Arc<dyn QueueStore>,
    clock: Arc<dyn Clock>,
    tracker: DeadlineTracker,
    extractor: BatchExtractor,
    dispatcher: Dispatcher,
}

impl Dispenser {
    pub(crate) fn from_parts(
        queues: BTreeMap<QueueName, QueueSpec>,
        store: Arc<dyn QueueStore>,
        clock: Arc<dyn Clock>,
        tracker: DeadlineTracker,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            extractor: BatchExtractor::new(Arc::clone(&store)),
            queues,
            store,
            clock,
            tracker,
            dispatcher,
        }
    }

    pub fn queue_names(&self) -> impl Iterator<Item = &QueueName> {
        self.queues.keys()
    }

    pub fn tracker(&self) -> &DeadlineTracker {
        &self.tracker
    }

    /// Mutable access to the pending-count cache, e.g. to inject drift.
    pub fn tracker_mut(&mut self) -> &mut DeadlineTracker {
        &mut self.tracker
    }

    /// Run until a fatal error or until `shutdown` turns `true`.
    ///
    /// Never returns `Ok`: an interrupt is reported as
    /// `DispenserError::Interrupted`. On any other fatal error, batches
    /// already handed to the worker pool are allowed to finish first.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), DispenserError> {
        let mut listener = self.start().await?;
        info!(
            workers = self.dispatcher.workers(),
            policy = ?self.dispatcher.policy(),
            "Starting message loop"
        );
        let fatal = loop {
            if let Err(err) = self.step(&mut listener, &mut shutdown).await {
                break err;
            }
        };

        if !matches!(fatal, DispenserError::Interrupted) {
            if let Err(late) = self.dispatcher.shutdown().await {
                warn!(error = %late, "Worker pool failed again while draining");
            }
        }
        Err(fatal)
    }

    /// Subscribe to notifications and load the true length of every queue.
    ///
    /// Subscribing first means a push racing the bootstrap is counted twice
    /// rather than missed; an overestimate only shortens one extraction.
    pub async fn start(&mut self) -> Result<NotificationListener, DispenserError> {
        let names: Vec<QueueName> = self.queues.keys().cloned().collect();
        let subscription = self.store.subscribe(&names).await?;
        info!(queues = ?names, "Subscribed to store notifications");

        let now = self.clock.now();
        let mut lengths = BTreeMap::new();
        for name in &names {
            let len = self.store.length(name).await?;
            if !self.tracker.reconcile(name, len, now) {
                return Err(DispenserError::Invariant(format!(
                    "queue {name} is configured but not tracked"
                )));
            }
            lengths.insert(name.as_str(), len);
        }
        info!(state = ?lengths, "Queues state");

        Ok(NotificationListener::new(subscription))
    }

    /// One Waiting → Reconciling → Evaluating cycle.
    pub async fn step(
        &mut self,
        listener: &mut NotificationListener,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), DispenserError> {
        let now = self.clock.now();
        let wait = if self.tracker.any_due(now) {
            Some(Duration::ZERO)
        } else {
            self.tracker.next_wait(now)
        };
        debug!(wait = ?wait, "Wait delay");

        let wake = tokio::select! {
            biased;
            _ = interrupted(shutdown) => Wake::Interrupted,
            failure = self.dispatcher.next_failure() => Wake::Failure(failure),
            event = listener.wait_for_event(wait) => Wake::Event(event),
        };

        match wake {
            Wake::Interrupted => return Err(DispenserError::Interrupted),
            Wake::Failure(Some(failure)) => self.dispatcher.report(failure)?,
            Wake::Failure(None) => {
                return Err(DispenserError::Invariant(
                    "worker pool stopped reporting".to_string(),
                ));
            }
            Wake::Event(event) => match event? {
                None => debug!("Check by timeout"),
                Some(event) if event.is_append() => {
                    if !self.tracker.record_arrival(&event.queue, self.clock.now()) {
                        warn!(queue = %event.queue, "Notification for unconfigured queue");
                    }
                }
                Some(event) => debug!(queue = %event.queue, kind = ?event.kind, "Skip message by type"),
            },
        }

        let flushed = self.evaluate(shutdown).await?;
        trace!(flushed, "Evaluation pass done");
        Ok(())
    }

    /// Flush every queue whose size or deadline condition holds.
    async fn evaluate(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<usize, DispenserError> {
        let batch_size = self.tracker.settings().batch_size;
        let mut flushed = 0;

        for (name, spec) in &self.queues {
            if *shutdown.borrow() {
                return Err(DispenserError::Interrupted);
            }

            let Some(reason) = self.tracker.flush_reason(name, self.clock.now()) else {
                trace!(queue = %name, pending = self.tracker.pending(name), "Accumulate batch");
                continue;
            };

            let pending = self.tracker.pending(name);
            let Extraction { batch, requested } =
                self.extractor.extract(name, pending.min(batch_size)).await?;

            debug!(
                queue = %name,
                pending,
                grouped = batch.len(),
                reason = reason.as_str(),
                batch_id = %batch.id(),
                "Apply task"
            );

            if !batch.is_empty() {
                tokio::select! {
                    biased;
                    _ = interrupted(shutdown) => return Err(DispenserError::Interrupted),
                    dispatched = self.dispatcher.dispatch(&spec.handler, batch) => dispatched?,
                }
            }

            self.tracker
                .record_extraction(name, requested, self.clock.now())?;
            flushed += 1;
        }

        Ok(flushed)
    }
}

/// Resolves once `shutdown` is `true`; never if the sender is gone.
async fn interrupted(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
