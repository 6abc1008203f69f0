//! Cancel command.

use console::style;

use super::super::helpers::connect_backends;
use crate::config::Settings;

/// Raise the cancellation flag for a job in the shared store.
pub async fn cmd_cancel(settings: &Settings, task_id: &str) -> anyhow::Result<()> {
    if settings.redis_url.is_none() {
        anyhow::bail!("Cancelling a job requires the shared Redis store (set REDIS_URL)");
    }

    let backends = connect_backends(settings).await?;
    backends
        .store
        .set_cancel_flag(task_id, settings.cancel_ttl())
        .await?;

    match backends.store.get_state(task_id).await? {
        Some(record) if record.is_terminal() => println!(
            "  {} Job {} already finished ({}); nothing to cancel",
            style("!").yellow(),
            task_id,
            record.status
        ),
        Some(record) => println!(
            "  {} Cancellation requested for {} (page {}/{})",
            style("✓").green(),
            task_id,
            record.current_page,
            record.total_pages
        ),
        None => println!(
            "  {} Cancellation requested for unknown job {}",
            style("!").yellow(),
            task_id
        ),
    }
    Ok(())
}
