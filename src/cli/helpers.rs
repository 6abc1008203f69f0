//! Shared wiring for CLI commands.

use std::sync::Arc;

use anyhow::Context;

use crate::config::Settings;
use crate::jobs::{InMemoryJobQueue, InMemoryJobStore, JobQueue, JobRunner, JobStateStore};
use crate::raster::DocumentRasterizer;
use crate::text::{build_spell_checker, TextPostProcessor};

/// Job store and queue selected by settings.
pub struct Backends {
    pub store: Arc<dyn JobStateStore>,
    pub queue: Arc<dyn JobQueue>,
    /// True when state is shared with other processes.
    pub shared: bool,
}

/// Connect the configured backends: Redis when `redis_url` is set,
/// in-process memory otherwise.
pub async fn connect_backends(settings: &Settings) -> anyhow::Result<Backends> {
    match settings.redis_url {
        Some(ref url) => connect_redis(settings, url).await,
        None => Ok(memory_backends(settings)),
    }
}

pub fn memory_backends(settings: &Settings) -> Backends {
    Backends {
        store: Arc::new(InMemoryJobStore::new(settings.job_ttl())),
        queue: Arc::new(InMemoryJobQueue::new()),
        shared: false,
    }
}

#[cfg(feature = "redis-backend")]
async fn connect_redis(settings: &Settings, url: &str) -> anyhow::Result<Backends> {
    use crate::jobs::{RedisJobQueue, RedisJobStore};

    let conn = crate::jobs::redis_connect(url)
        .await
        .with_context(|| format!("Failed to connect to Redis at {}", url))?;
    tracing::debug!("Connected to Redis");

    Ok(Backends {
        store: Arc::new(RedisJobStore::from_connection(
            conn.clone(),
            settings.job_ttl(),
        )),
        queue: Arc::new(RedisJobQueue::from_connection(conn)),
        shared: true,
    })
}

#[cfg(not(feature = "redis-backend"))]
async fn connect_redis(_settings: &Settings, _url: &str) -> anyhow::Result<Backends> {
    anyhow::bail!("REDIS_URL is set but this build lacks the 'redis-backend' feature")
}

/// Build a runner with the configured OCR backend and spell checker.
pub fn build_runner(settings: &Settings, store: Arc<dyn JobStateStore>) -> anyhow::Result<JobRunner> {
    let ocr = crate::ocr::build_backend(&settings.ocr).context("Failed to set up OCR backend")?;
    let checker =
        build_spell_checker(&settings.spellcheck).context("Failed to set up spell checker")?;

    Ok(JobRunner::new(
        store,
        Arc::new(DocumentRasterizer::new()),
        ocr,
        TextPostProcessor::new(checker),
    ))
}

/// Wait for ctrl-c; never resolves if the signal cannot be installed.
pub async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
