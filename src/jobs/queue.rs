//! Job hand-off from the HTTP layer to workers.
//!
//! Delivery is best effort: a job popped by a worker that then dies is lost.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::models::JobRequest;

/// Errors from queue operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue backend error: {0}")]
    Backend(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Queue closed")]
    Closed,
}

impl From<serde_json::Error> for QueueError {
    fn from(e: serde_json::Error) -> Self {
        QueueError::Serialization(e.to_string())
    }
}

/// FIFO of submitted jobs.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, request: JobRequest) -> Result<(), QueueError>;

    /// Next job, waiting at most `wait`. None when nothing arrived in time.
    async fn dequeue(&self, wait: Duration) -> Result<Option<JobRequest>, QueueError>;
}

/// Single-process queue over a tokio channel. Clones share the channel.
#[derive(Clone)]
pub struct InMemoryJobQueue {
    tx: mpsc::UnboundedSender<JobRequest>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<JobRequest>>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, request: JobRequest) -> Result<(), QueueError> {
        self.tx.send(request).map_err(|_| QueueError::Closed)
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<JobRequest>, QueueError> {
        let mut rx = self.rx.lock().await;
        match tokio::time::timeout(wait, rx.recv()).await {
            Ok(Some(request)) => Ok(Some(request)),
            Ok(None) => Err(QueueError::Closed),
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentKind;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = InMemoryJobQueue::new();
        let first = JobRequest::new("a.png", ContentKind::Image, vec![1]);
        let second = JobRequest::new("b.pdf", ContentKind::Pdf, vec![2]);
        queue.enqueue(first.clone()).await.unwrap();
        queue.enqueue(second.clone()).await.unwrap();

        let wait = Duration::from_millis(50);
        assert_eq!(queue.dequeue(wait).await.unwrap().unwrap().job_id, first.job_id);
        assert_eq!(queue.dequeue(wait).await.unwrap().unwrap().job_id, second.job_id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dequeue_times_out_when_empty() {
        let queue = InMemoryJobQueue::new();
        assert!(queue
            .dequeue(Duration::from_secs(1))
            .await
            .unwrap()
            .is_none());
    }
}
