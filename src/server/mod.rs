//! HTTP surface for the OCR pipeline.
//!
//! - `POST /ocr/process`: upload a document, returns `{task_id}`
//! - `POST /ocr/cancel-ocr/:task_id`: request cancellation
//! - `GET /ocr/progress/:task_id`: WebSocket progress channel
//! - `GET /ocr/status/:task_id`: current job record
//! - editor helpers (spellcheck, rich text to plain text) and `/healthz`

mod handlers;
mod progress;
mod routes;

pub use handlers::{CancelResponse, ErrorResponse, ProcessResponse};
pub use progress::{progress_stream, ProgressMessage, NOT_FOUND_STATE};
pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::jobs::{JobQueue, JobStateStore};
use crate::text::SpellChecker;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JobStateStore>,
    pub queue: Arc<dyn JobQueue>,
    /// Checker behind the spellcheck endpoint.
    pub spell: Arc<dyn SpellChecker>,
    pub cancel_ttl: Duration,
    pub poll_interval: Duration,
}

impl AppState {
    pub fn new(
        settings: &Settings,
        store: Arc<dyn JobStateStore>,
        queue: Arc<dyn JobQueue>,
        spell: Arc<dyn SpellChecker>,
    ) -> Self {
        Self {
            store,
            queue,
            spell,
            cancel_ttl: settings.cancel_ttl(),
            poll_interval: settings.poll_interval(),
        }
    }
}

/// Start the web server and run until ctrl-c.
pub async fn serve(settings: &Settings, state: AppState) -> anyhow::Result<()> {
    let app = create_router(state, settings);

    let addr: SocketAddr = settings.bind.parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down server");
}
