//! Router configuration for the web server.

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::progress::progress_ws;
use super::AppState;
use crate::config::Settings;

/// Create the main router with all routes.
pub fn create_router(state: AppState, settings: &Settings) -> Router {
    Router::new()
        // OCR jobs
        .route("/ocr/process", post(handlers::process_upload))
        .route("/ocr/cancel-ocr/:task_id", post(handlers::cancel_ocr))
        .route("/ocr/progress/:task_id", get(progress_ws))
        .route("/ocr/status/:task_id", get(handlers::job_status))
        // Editor text utilities
        .route(
            "/ocr/find_misspelled_words",
            post(handlers::find_misspelled_words),
        )
        .route(
            "/ocr/richtext_to_plaintext",
            post(handlers::richtext_to_plaintext),
        )
        .route("/healthz", get(handlers::health))
        .layer(DefaultBodyLimit::max(settings.max_upload_bytes))
        .layer(cors_layer(&settings.cors_origins()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for the configured origins, with credentials.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    // Wildcards are not allowed together with credentials, so methods and
    // headers mirror the preflight request.
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}
