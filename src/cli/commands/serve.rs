//! Web server command.

use console::style;

use super::super::helpers::{build_runner, connect_backends};
use crate::config::Settings;
use crate::jobs::WorkerPool;
use crate::server::AppState;

/// Start the web server, optionally hosting workers in-process.
pub async fn cmd_serve(
    settings: &Settings,
    bind: Option<String>,
    workers: Option<usize>,
) -> anyhow::Result<()> {
    let mut settings = settings.clone();
    if let Some(bind) = bind {
        settings.bind = normalize_bind_address(&bind);
    }
    if let Some(workers) = workers {
        settings.workers = workers;
    }

    let backends = connect_backends(&settings).await?;
    if backends.shared {
        println!("  {} Job state in Redis", style("✓").green());
    } else {
        println!("  {} Job state in memory (single process)", style("✓").green());
        if settings.workers == 0 {
            eprintln!(
                "  {} No workers and no shared queue: uploaded jobs will never run",
                style("!").yellow()
            );
        }
    }

    let runner = build_runner(&settings, backends.store.clone())?;
    warn_missing_tools();

    let pool = (settings.workers > 0)
        .then(|| WorkerPool::spawn(settings.workers, backends.queue.clone(), runner));

    let spell = crate::text::build_spell_checker(&settings.spellcheck)?;
    let state = AppState::new(&settings, backends.store, backends.queue, spell);

    println!(
        "{} Starting pageocr server at http://{}",
        style("→").cyan(),
        settings.bind
    );
    println!("  Press Ctrl+C to stop");

    let result = crate::server::serve(&settings, state).await;

    if let Some(pool) = pool {
        println!("{} Waiting for running jobs...", style("→").cyan());
        pool.shutdown().await;
    }
    result
}

/// Warn about external tools the pipeline shells out to.
pub(crate) fn warn_missing_tools() {
    if !crate::raster::poppler_available() {
        eprintln!(
            "  {} pdfinfo/pdftoppm not found: PDF uploads will fail (install poppler-utils)",
            style("!").yellow()
        );
    }
}

/// Accept a bind address that can be:
/// - Just a port: "8000" -> 127.0.0.1:8000
/// - Just a host: "0.0.0.0" -> 0.0.0.0:8000
/// - Host and port: "0.0.0.0:8000"
fn normalize_bind_address(bind: &str) -> String {
    if let Ok(port) = bind.parse::<u16>() {
        return format!("127.0.0.1:{}", port);
    }

    if let Some((_, port_str)) = bind.rsplit_once(':') {
        if port_str.parse::<u16>().is_ok() {
            return bind.to_string();
        }
    }

    format!("{}:8000", bind)
}
