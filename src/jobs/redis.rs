//! Redis-backed job store and queue for multi-process deployments.
//!
//! The HTTP server and any number of `pageocr worker` processes share
//! state through these keys:
//! - `pageocr:job:{id}`: JSON job record, `SET EX` with the job TTL
//! - `pageocr:cancel:{id}`: cancellation flag, `SET EX`, consumed with `GETDEL`
//! - `pageocr:queue`: list of JSON job requests (`LPUSH` / `RPOP`)

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use super::queue::{JobQueue, QueueError};
use super::store::{JobStateStore, StoreError, StoreResult};
use crate::models::{JobRecord, JobRequest};

/// Key prefix for all pageocr data in Redis.
const KEY_PREFIX: &str = "pageocr:";
/// Pause between `RPOP` attempts on an empty queue.
const QUEUE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Open a managed connection (reconnects automatically).
pub async fn connect(redis_url: &str) -> Result<ConnectionManager, redis::RedisError> {
    let client = redis::Client::open(redis_url)?;
    ConnectionManager::new(client).await
}

fn job_key(job_id: &str) -> String {
    format!("{}job:{}", KEY_PREFIX, job_id)
}

fn cancel_key(job_id: &str) -> String {
    format!("{}cancel:{}", KEY_PREFIX, job_id)
}

fn queue_key() -> String {
    format!("{}queue", KEY_PREFIX)
}

fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

/// Redis-backed job store.
#[derive(Clone)]
pub struct RedisJobStore {
    conn: ConnectionManager,
    job_ttl: Duration,
}

impl RedisJobStore {
    /// Connect to Redis.
    ///
    /// # Arguments
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    /// * `job_ttl` - Lifetime of a job record after its last write
    pub async fn new(redis_url: &str, job_ttl: Duration) -> StoreResult<Self> {
        let conn = connect(redis_url)
            .await
            .map_err(|e| StoreError::Backend(format!("Redis connection error: {}", e)))?;
        Ok(Self::from_connection(conn, job_ttl))
    }

    pub fn from_connection(conn: ConnectionManager, job_ttl: Duration) -> Self {
        Self { conn, job_ttl }
    }
}

#[async_trait]
impl JobStateStore for RedisJobStore {
    async fn set_state(&self, job_id: &str, record: &JobRecord) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(record)?;

        redis::cmd("SET")
            .arg(job_key(job_id))
            .arg(payload)
            .arg("EX")
            .arg(ttl_secs(self.job_ttl))
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn get_state(&self, job_id: &str) -> StoreResult<Option<JobRecord>> {
        let mut conn = self.conn.clone();

        let payload: Option<String> = redis::cmd("GET")
            .arg(job_key(job_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set_cancel_flag(&self, job_id: &str, ttl: Duration) -> StoreResult<()> {
        let mut conn = self.conn.clone();

        redis::cmd("SET")
            .arg(cancel_key(job_id))
            .arg(1)
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn get_and_clear_cancel_flag(&self, job_id: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();

        // GETDEL (Redis >= 6.2): two racing readers cannot both see the flag.
        let flag: Option<String> = redis::cmd("GETDEL")
            .arg(cancel_key(job_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(flag.is_some())
    }
}

/// Redis list used as a FIFO work queue.
#[derive(Clone)]
pub struct RedisJobQueue {
    conn: ConnectionManager,
}

impl RedisJobQueue {
    pub async fn new(redis_url: &str) -> Result<Self, QueueError> {
        let conn = connect(redis_url)
            .await
            .map_err(|e| QueueError::Backend(format!("Redis connection error: {}", e)))?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    async fn pop(&self) -> Result<Option<JobRequest>, QueueError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = redis::cmd("RPOP")
            .arg(queue_key())
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;

        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, request: JobRequest) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(&request)?;

        redis::cmd("LPUSH")
            .arg(queue_key())
            .arg(payload)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<JobRequest>, QueueError> {
        // Polling RPOP instead of BRPOP keeps the shared multiplexed
        // connection free for state writes.
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            if let Some(request) = self.pop().await? {
                return Ok(Some(request));
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(QUEUE_POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentKind, JobStatus};

    #[test]
    fn test_key_namespaces_are_separate() {
        assert_eq!(job_key("abc"), "pageocr:job:abc");
        assert_eq!(cancel_key("abc"), "pageocr:cancel:abc");
        assert_ne!(job_key("abc"), cancel_key("abc"));
        assert_eq!(queue_key(), "pageocr:queue");
    }

    #[test]
    fn test_ttl_never_zero() {
        assert_eq!(ttl_secs(Duration::from_millis(10)), 1);
        assert_eq!(ttl_secs(Duration::from_secs(600)), 600);
    }

    /// Runs only when PAGEOCR_TEST_REDIS_URL points at a disposable Redis.
    #[tokio::test]
    async fn test_redis_round_trip() {
        let Ok(url) = std::env::var("PAGEOCR_TEST_REDIS_URL") else {
            return;
        };
        let store = RedisJobStore::new(&url, Duration::from_secs(60))
            .await
            .unwrap();
        let queue = RedisJobQueue::new(&url).await.unwrap();

        let request = JobRequest::new("scan.png", ContentKind::Image, vec![1, 2, 3]);
        let id = request.job_id.clone();

        store.set_state(&id, &JobRecord::pending()).await.unwrap();
        let record = store.get_state(&id).await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Pending);

        store
            .set_cancel_flag(&id, Duration::from_secs(600))
            .await
            .unwrap();
        assert!(store.get_and_clear_cancel_flag(&id).await.unwrap());
        assert!(!store.get_and_clear_cancel_flag(&id).await.unwrap());

        queue.enqueue(request).await.unwrap();
        let popped = queue.dequeue(Duration::from_secs(1)).await.unwrap().unwrap();
        assert_eq!(popped.job_id, id);
        assert_eq!(popped.bytes, vec![1, 2, 3]);
    }
}
