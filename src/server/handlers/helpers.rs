//! Shared response types for handlers.

use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};

/// JSON error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error half of a handler result.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

/// Query parameter carrying editor text.
#[derive(Debug, Deserialize)]
pub struct TextQuery {
    #[serde(default)]
    pub text: String,
}
