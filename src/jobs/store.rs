//! Pluggable store for job records and cancellation flags.
//!
//! Allows swapping between in-memory (single process) and Redis
//! (submitter and workers in separate processes).

use std::time::Duration;

use async_trait::async_trait;

use crate::models::JobRecord;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from job store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store backend error: {0}")]
    Backend(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Shared key/value view of job state.
///
/// Records and cancellation flags live in separate namespaces, so consuming
/// a flag never touches the record. Implementations must be safe under
/// concurrent access from the submitter, workers and progress readers.
#[async_trait]
pub trait JobStateStore: Send + Sync {
    /// Overwrite the record for `job_id`, refreshing its TTL.
    async fn set_state(&self, job_id: &str, record: &JobRecord) -> StoreResult<()>;

    /// Current record, or None if unknown or expired.
    async fn get_state(&self, job_id: &str) -> StoreResult<Option<JobRecord>>;

    /// Raise the single-shot cancellation flag for `job_id`.
    async fn set_cancel_flag(&self, job_id: &str, ttl: Duration) -> StoreResult<()>;

    /// Atomically read and delete the flag. True at most once per raise.
    async fn get_and_clear_cancel_flag(&self, job_id: &str) -> StoreResult<bool>;
}
