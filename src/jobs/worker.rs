//! Worker pool: N tokio tasks pulling jobs from a [`JobQueue`].
//!
//! Each task runs one job at a time to completion; jobs are independent.
//! Shutdown is signalled through a `watch` channel and takes effect between
//! jobs, so an in-flight job always reaches its terminal state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::queue::{JobQueue, QueueError};
use super::runner::{JobOutcome, JobRunner};

/// How long a worker waits on an empty queue before re-checking shutdown.
const DEQUEUE_WAIT: Duration = Duration::from_secs(1);
/// Back-off after a queue error.
const ERROR_BACKOFF: Duration = Duration::from_secs(2);

/// A running pool of workers.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl WorkerPool {
    /// Spawn `concurrency` workers (at least one).
    pub fn spawn(concurrency: usize, queue: Arc<dyn JobQueue>, runner: JobRunner) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handles = (0..concurrency.max(1))
            .map(|worker_id| {
                let queue = queue.clone();
                let runner = runner.clone();
                let shutdown_rx = shutdown_rx.clone();
                tokio::spawn(async move {
                    worker_loop(worker_id, queue, runner, shutdown_rx).await;
                })
            })
            .collect::<Vec<_>>();

        info!("Started {} OCR worker(s)", handles.len());
        Self {
            handles,
            shutdown_tx,
        }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Signal shutdown and wait for every worker to finish its current job.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Worker task panicked: {}", e);
            }
        }
        info!("Worker pool stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<dyn JobQueue>,
    runner: JobRunner,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    debug!(worker_id, "Worker started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let next = tokio::select! {
            next = queue.dequeue(DEQUEUE_WAIT) => next,
            _ = shutdown_rx.changed() => break,
        };

        match next {
            Ok(Some(request)) => {
                let job_id = request.job_id.clone();
                match runner.run(request).await {
                    JobOutcome::Succeeded { pages } => {
                        debug!(worker_id, job_id = %job_id, pages, "Job succeeded")
                    }
                    JobOutcome::Failed { error } => {
                        debug!(worker_id, job_id = %job_id, "Job failed: {}", error)
                    }
                    JobOutcome::Cancelled { completed } => {
                        debug!(worker_id, job_id = %job_id, completed, "Job cancelled")
                    }
                }
            }
            Ok(None) => {}
            Err(QueueError::Closed) => {
                info!(worker_id, "Queue closed, worker exiting");
                break;
            }
            Err(e) => {
                error!(worker_id, "Queue error: {}", e);
                tokio::select! {
                    _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                    _ = shutdown_rx.changed() => break,
                }
            }
        }
    }

    debug!(worker_id, "Worker stopped");
}
