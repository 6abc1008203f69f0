//! Standalone worker command.

use console::style;

use super::super::helpers::{build_runner, connect_backends, ctrl_c};
use super::serve::warn_missing_tools;
use crate::config::Settings;
use crate::jobs::WorkerPool;

/// Run OCR workers against the shared Redis queue until ctrl-c.
pub async fn cmd_worker(settings: &Settings, concurrency: Option<usize>) -> anyhow::Result<()> {
    if settings.redis_url.is_none() {
        anyhow::bail!(
            "A standalone worker needs a shared queue: set REDIS_URL or redis_url in the config"
        );
    }

    let backends = connect_backends(settings).await?;
    let runner = build_runner(settings, backends.store.clone())?;
    warn_missing_tools();

    let concurrency = concurrency.unwrap_or(settings.workers).max(1);
    let pool = WorkerPool::spawn(concurrency, backends.queue, runner);

    println!(
        "{} Worker running with {} slot(s)",
        style("→").cyan(),
        pool.size()
    );
    println!("  Press Ctrl+C to stop");

    ctrl_c().await;

    println!("{} Finishing running jobs...", style("→").cyan());
    pool.shutdown().await;
    println!("  {} Stopped", style("✓").green());
    Ok(())
}
