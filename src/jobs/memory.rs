//! In-memory job store for single-process operation.
//!
//! Lock-based; state is lost on restart. Expired entries are hidden on read
//! and purged on write.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::store::{JobStateStore, StoreResult};
use crate::models::JobRecord;

#[derive(Debug, Clone)]
struct Entry {
    record: JobRecord,
    expires_at: Instant,
}

/// In-memory job store. Clones share the same maps.
#[derive(Debug, Clone)]
pub struct InMemoryJobStore {
    jobs: Arc<RwLock<HashMap<String, Entry>>>,
    flags: Arc<RwLock<HashMap<String, Instant>>>,
    job_ttl: Duration,
}

impl InMemoryJobStore {
    pub fn new(job_ttl: Duration) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            flags: Arc::new(RwLock::new(HashMap::new())),
            job_ttl,
        }
    }

    /// Number of live job records.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.jobs
            .read()
            .await
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(crate::config::DEFAULT_JOB_TTL_SECS))
    }
}

#[async_trait]
impl JobStateStore for InMemoryJobStore {
    async fn set_state(&self, job_id: &str, record: &JobRecord) -> StoreResult<()> {
        let now = Instant::now();
        let mut jobs = self.jobs.write().await;
        jobs.retain(|_, e| e.expires_at > now);
        jobs.insert(
            job_id.to_string(),
            Entry {
                record: record.clone(),
                expires_at: now + self.job_ttl,
            },
        );
        Ok(())
    }

    async fn get_state(&self, job_id: &str) -> StoreResult<Option<JobRecord>> {
        let jobs = self.jobs.read().await;
        Ok(jobs
            .get(job_id)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.record.clone()))
    }

    async fn set_cancel_flag(&self, job_id: &str, ttl: Duration) -> StoreResult<()> {
        let now = Instant::now();
        let mut flags = self.flags.write().await;
        flags.retain(|_, expires_at| *expires_at > now);
        flags.insert(job_id.to_string(), now + ttl);
        Ok(())
    }

    async fn get_and_clear_cancel_flag(&self, job_id: &str) -> StoreResult<bool> {
        // Single write lock: read and delete are one step.
        let mut flags = self.flags.write().await;
        Ok(flags
            .remove(job_id)
            .is_some_and(|expires_at| expires_at > Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get_state() {
        let store = InMemoryJobStore::default();
        assert_eq!(store.get_state("job").await.unwrap(), None);

        let record = JobRecord::progress(2, 1, 4);
        store.set_state("job", &record).await.unwrap();
        assert_eq!(store.get_state("job").await.unwrap(), Some(record));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_cancel_flag_is_single_shot() {
        let store = InMemoryJobStore::default();
        store
            .set_cancel_flag("job", Duration::from_secs(600))
            .await
            .unwrap();
        // A second raise before consumption is the same flag.
        store
            .set_cancel_flag("job", Duration::from_secs(600))
            .await
            .unwrap();

        assert!(store.get_and_clear_cancel_flag("job").await.unwrap());
        assert!(!store.get_and_clear_cancel_flag("job").await.unwrap());
    }

    #[tokio::test]
    async fn test_clearing_flag_keeps_record() {
        let store = InMemoryJobStore::default();
        let record = JobRecord::pending();
        store.set_state("job", &record).await.unwrap();
        store
            .set_cancel_flag("job", Duration::from_secs(600))
            .await
            .unwrap();

        assert!(store.get_and_clear_cancel_flag("job").await.unwrap());
        assert_eq!(store.get_state("job").await.unwrap(), Some(record));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let store = InMemoryJobStore::new(Duration::from_secs(60));
        store.set_state("job", &JobRecord::pending()).await.unwrap();
        store
            .set_cancel_flag("job", Duration::from_secs(10))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(!store.get_and_clear_cancel_flag("job").await.unwrap());
        assert!(store.get_state("job").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(store.get_state("job").await.unwrap().is_none());
        assert!(store.is_empty().await);
    }
}
