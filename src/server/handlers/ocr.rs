//! OCR job endpoints: upload, cancel, status.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::super::AppState;
use super::helpers::{api_error, ApiError};
use crate::jobs::JobError;
use crate::models::{ContentKind, JobRecord, JobRequest};

/// Name of the multipart field holding the document.
const FILE_FIELD: &str = "file";

/// Response for an accepted upload.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub task_id: String,
}

/// Response for a cancellation request.
#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    pub task_id: String,
    pub status: String,
}

/// `POST /ocr/process`: accept a document and queue an OCR job.
pub async fn process_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ProcessResponse>, ApiError> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        error!("Failed to read multipart field: {}", e);
        api_error(e.status(), format!("Failed to read upload: {}", e))
    })? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let data = field.bytes().await.map_err(|e| {
            error!("Failed to read file data: {}", e);
            api_error(e.status(), format!("Failed to read file data: {}", e))
        })?;
        debug!("Received '{}' ({} bytes)", file_name, data.len());
        upload = Some((file_name, data));
        break;
    }

    let (file_name, data) = upload.ok_or_else(|| {
        api_error(
            StatusCode::BAD_REQUEST,
            format!("Missing '{}' field", FILE_FIELD),
        )
    })?;

    let kind = ContentKind::detect(&data, Some(&file_name)).ok_or_else(|| {
        let err = JobError::UnsupportedFileKind(file_name.clone());
        api_error(StatusCode::BAD_REQUEST, err.to_string())
    })?;

    let request = JobRequest::new(file_name, kind, data.to_vec());
    let task_id = request.job_id.clone();

    // PENDING is visible before any worker can pick the job up.
    state
        .store
        .set_state(&task_id, &JobRecord::pending())
        .await
        .map_err(|e| unavailable(JobError::from(e)))?;
    state
        .queue
        .enqueue(request)
        .await
        .map_err(|e| unavailable(JobError::from(e)))?;

    info!(job_id = %task_id, kind = %kind, "Queued OCR job");
    Ok(Json(ProcessResponse { task_id }))
}

/// `POST /ocr/cancel-ocr/:task_id`: raise the cancellation flag.
///
/// Idempotent. Unknown or finished jobs are left untouched; the flag expires.
pub async fn cancel_ocr(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    state
        .store
        .set_cancel_flag(&task_id, state.cancel_ttl)
        .await
        .map_err(|e| unavailable(JobError::from(e)))?;

    info!(job_id = %task_id, "Cancellation requested");
    Ok(Json(CancelResponse {
        task_id,
        status: "CANCEL".to_string(),
    }))
}

/// `GET /ocr/status/:task_id`: current job record.
pub async fn job_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<JobRecord>, ApiError> {
    match state.store.get_state(&task_id).await {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(api_error(
            StatusCode::NOT_FOUND,
            JobError::JobNotFound(task_id).to_string(),
        )),
        Err(e) => Err(unavailable(JobError::from(e))),
    }
}

fn unavailable(err: JobError) -> ApiError {
    error!("{}", err);
    api_error(StatusCode::SERVICE_UNAVAILABLE, err.to_string())
}
