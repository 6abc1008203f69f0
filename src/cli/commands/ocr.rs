//! One-shot local OCR command.
//!
//! Runs a single job in-process and drives a progress bar from the same
//! progress stream the WebSocket endpoint uses. Ctrl-C requests
//! cancellation at the next page boundary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use console::style;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::JoinHandle;

use super::super::helpers::{build_runner, ctrl_c, memory_backends};
use super::serve::warn_missing_tools;
use crate::config::Settings;
use crate::jobs::{JobOutcome, JobStateStore};
use crate::models::{ContentKind, JobRecord, JobRequest};
use crate::server::{progress_stream, ProgressMessage};

/// OCR a local file and print (or write) the formatted result.
pub async fn cmd_ocr(settings: &Settings, file: &Path, output: Option<PathBuf>) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());

    let kind = ContentKind::detect(&bytes, Some(&file_name))
        .with_context(|| format!("Unsupported file kind: {}", file_name))?;

    warn_missing_tools();

    let backends = memory_backends(settings);
    let store: Arc<dyn JobStateStore> = backends.store;
    let runner = build_runner(settings, store.clone())?;

    let request = JobRequest::new(file_name.clone(), kind, bytes);
    let job_id = request.job_id.clone();
    store.set_state(&job_id, &JobRecord::pending()).await?;

    println!(
        "{} OCR {} ({}) with {}",
        style("→").cyan(),
        file_name,
        kind,
        settings.ocr.backend
    );

    let job = tokio::spawn(async move { runner.run(request).await });

    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} pages {wide_msg}")
            .context("Invalid progress template")?
            .progress_chars("█▓░"),
    );
    progress.set_message("Rasterizing...");

    let updates = progress_stream(store.clone(), job_id.clone(), settings.poll_interval());
    futures::pin_mut!(updates);

    let mut last: Option<ProgressMessage> = None;
    let mut cancel_sent = false;
    loop {
        tokio::select! {
            update = updates.next() => {
                let Some(update) = update else { break };
                if update.total_pages > 0 {
                    progress.set_length(u64::from(update.total_pages));
                    progress.set_position(u64::from(update.current_page));
                }
                progress.set_message(format!("{} {}%", update.state, update.progress));
                last = Some(update);
            }
            _ = ctrl_c() => {
                if cancel_sent {
                    // Second Ctrl-C: stop waiting for the page in flight.
                    job.abort();
                    progress.abandon_with_message("Interrupted");
                    anyhow::bail!("Interrupted before job {} finished", job_id);
                }
                cancel_sent = true;
                progress.set_message("Cancelling after current page (Ctrl-C again to quit)...");
                store.set_cancel_flag(&job_id, settings.cancel_ttl()).await?;
            }
        }
    }
    progress.finish_and_clear();

    let outcome = join_runner(job).await?;
    tracing::debug!(job_id = %job_id, ?outcome, "Local OCR job finished");

    let ProgressMessage {
        state,
        result,
        error,
        current_page,
        total_pages,
        ..
    } = last.context("No progress received")?;
    match (state.as_str(), result, error) {
        ("SUCCESS", Some(result), _) => {
            match output {
                Some(path) => {
                    tokio::fs::write(&path, &result)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!(
                        "  {} {} page(s) written to {}",
                        style("✓").green(),
                        total_pages,
                        path.display()
                    );
                }
                None => println!("{}", result),
            }
            Ok(())
        }
        ("CANCELLED", _, _) => {
            println!(
                "  {} Cancelled after {}/{} page(s)",
                style("!").yellow(),
                current_page, total_pages
            );
            Ok(())
        }
        (_, _, Some(error)) => {
            eprintln!("  {} {}", style("✗").red(), error);
            anyhow::bail!("OCR failed")
        }
        (state, _, _) => anyhow::bail!("OCR ended in unexpected state {}", state),
    }
}

/// Wait for the runner task; a panic in it becomes an error.
async fn join_runner(job: JoinHandle<JobOutcome>) -> anyhow::Result<JobOutcome> {
    job.await.context("OCR job task failed")
}
