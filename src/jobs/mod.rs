//! OCR job pipeline: state store, queue, runner and worker pool.

mod memory;
mod queue;
#[cfg(feature = "redis-backend")]
mod redis;
mod runner;
mod store;
mod worker;

pub use memory::InMemoryJobStore;
pub use queue::{InMemoryJobQueue, JobQueue, QueueError};
#[cfg(feature = "redis-backend")]
pub use self::redis::{connect as redis_connect, RedisJobQueue, RedisJobStore};
pub use runner::{JobError, JobOutcome, JobRunner};
pub use store::{JobStateStore, StoreError, StoreResult};
pub use worker::WorkerPool;
