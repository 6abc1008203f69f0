//! Text utility endpoints used by the document editor.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};

use super::super::AppState;
use super::helpers::{api_error, ApiError, TextQuery};

/// `POST /ocr/find_misspelled_words?text=...`: corrected text as a JSON string.
pub async fn find_misspelled_words(
    State(state): State<AppState>,
    Query(query): Query<TextQuery>,
) -> Result<Json<String>, ApiError> {
    state
        .spell
        .correct(&query.text)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::warn!("Spellcheck failed: {}", e);
            api_error(StatusCode::BAD_GATEWAY, e.to_string())
        })
}

/// `POST /ocr/richtext_to_plaintext?text=...`: `[plain_text, text_without_spans]`.
pub async fn richtext_to_plaintext(Query(query): Query<TextQuery>) -> Json<(String, String)> {
    Json(crate::text::richtext_to_plaintext(&query.text))
}
