//! WorkerPool - fixed set of workers fed by a bounded job queue.
//!
//! # Flow
//! 1. The engine `submit`s `(handler, batch)`; this only waits when the job
//!    queue is full.
//! 2. A free worker takes the job and runs the handler in its own task, so a
//!    panic is contained to that job.
//! 3. Failures come back to the engine over `next_failure`, possibly long
//!    after the engine has moved on from that queue.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::{Batch, DispenserError, TaskFailure};
use crate::typed::BatchHandler;

struct PoolJob {
    handler: Arc<dyn BatchHandler>,
    batch: Batch,
}

pub struct WorkerPool {
    job_tx: mpsc::Sender<PoolJob>,
    failure_rx: mpsc::UnboundedReceiver<TaskFailure>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` workers sharing a job queue of `capacity` slots.
    pub fn spawn(workers: usize, capacity: usize) -> Self {
        let (job_tx, job_rx) = mpsc::channel(capacity.max(1));
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (failure_tx, failure_rx) = mpsc::unbounded_channel();

        let mut joins = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let jobs = Arc::clone(&job_rx);
            let failures = failure_tx.clone();
            joins.push(tokio::spawn(async move {
                worker_loop(worker_id, jobs, failures).await;
            }));
        }

        Self {
            job_tx,
            failure_rx,
            joins,
        }
    }

    pub fn size(&self) -> usize {
        self.joins.len()
    }

    /// Queue a batch for execution.
    pub async fn submit(
        &self,
        handler: Arc<dyn BatchHandler>,
        batch: Batch,
    ) -> Result<(), DispenserError> {
        self.job_tx
            .send(PoolJob { handler, batch })
            .await
            .map_err(|_| DispenserError::Invariant("worker pool has shut down".to_string()))
    }

    /// Next failure reported by a worker. Cancel safe.
    pub async fn next_failure(&mut self) -> Option<TaskFailure> {
        self.failure_rx.recv().await
    }

    /// Stop accepting jobs, let workers finish what is queued, and return the
    /// failures nobody has collected yet.
    pub async fn shutdown_and_join(self) -> Vec<TaskFailure> {
        let WorkerPool {
            job_tx,
            mut failure_rx,
            joins,
        } = self;
        drop(job_tx);
        for join in joins {
            let _ = join.await;
        }
        let mut failures = Vec::new();
        while let Ok(failure) = failure_rx.try_recv() {
            failures.push(failure);
        }
        failures
    }
}

async fn worker_loop(
    worker_id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<PoolJob>>>,
    failures: mpsc::UnboundedSender<TaskFailure>,
) {
    loop {
        // lock は recv の間だけ保持する（handler 実行中は他の worker が受け取れる）
        let job = {
            let mut rx = jobs.lock().await;
            rx.recv().await
        };
        let Some(PoolJob { handler, batch }) = job else {
            debug!(worker_id, "Job queue closed, worker exiting");
            break;
        };

        if let Some(failure) = run_isolated(handler, batch).await {
            // engine 側が既に終了していれば送れないが、それで良い
            if failures.send(failure).is_err() {
                warn!(worker_id, "Failure dropped: engine no longer listening");
            }
        }
    }
}

/// Run one job in its own task, turning errors and panics into failures.
async fn run_isolated(handler: Arc<dyn BatchHandler>, batch: Batch) -> Option<TaskFailure> {
    let queue = batch.queue().clone();
    let batch_id = batch.id();
    let batch_len = batch.len();
    let name = handler.name().to_string();

    let joined = tokio::spawn(async move { handler.handle(batch).await }).await;
    let source = match joined {
        Ok(Ok(())) => {
            debug!(queue = %queue, batch_id = %batch_id, batch_len, handler = %name, "Batch done");
            return None;
        }
        Ok(Err(err)) => err,
        Err(join_err) if join_err.is_panic() => {
            format!("handler panicked: {}", panic_message(join_err.into_panic())).into()
        }
        Err(join_err) => format!("handler task cancelled: {join_err}").into(),
    };
    Some(TaskFailure::new(queue, name, batch_id, batch_len, source))
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
