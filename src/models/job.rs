//! OCR job models shared by the runner, the state store and the gateway.
//!
//! A job record is the only thing the submitting process and the worker
//! process share. Terminal-state payloads live inside the status variant so
//! a FAILURE can never carry a result and a SUCCESS never carries an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a job, with the fields that only exist in some states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Enqueued, no page processed yet.
    Pending,
    /// Running; one write per page boundary.
    Progress,
    /// Finished; carries the formatted artifact.
    Success { result: String },
    /// Aborted by an error; partial text is never kept.
    Failure { error: String },
    /// Stopped at a page boundary after a cancellation request.
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Progress => "PROGRESS",
            Self::Success { .. } => "SUCCESS",
            Self::Failure { .. } => "FAILURE",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// No transition leaves a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success { .. } | Self::Failure { .. } | Self::Cancelled
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Externally visible snapshot of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(flatten)]
    pub status: JobStatus,
    /// Page currently being (or last) processed, 1-indexed; 0 before the first page.
    pub current_page: u32,
    /// Page count of the rasterized document; 0 while unknown.
    pub total_pages: u32,
    /// Derived from `current_page / total_pages`.
    pub progress_percent: u8,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Record written by the submitter right before enqueueing.
    pub fn pending() -> Self {
        Self {
            status: JobStatus::Pending,
            current_page: 0,
            total_pages: 0,
            progress_percent: 0,
            updated_at: Utc::now(),
        }
    }

    /// PROGRESS at page `current_page`, with progress computed from `completed` pages.
    pub fn progress(current_page: u32, completed: u32, total_pages: u32) -> Self {
        Self {
            status: JobStatus::Progress,
            current_page,
            total_pages,
            progress_percent: progress_percent(completed, total_pages),
            updated_at: Utc::now(),
        }
    }

    pub fn success(result: String, total_pages: u32) -> Self {
        Self {
            status: JobStatus::Success { result },
            current_page: total_pages,
            total_pages,
            progress_percent: 100,
            updated_at: Utc::now(),
        }
    }

    pub fn failure(error: impl Into<String>, current_page: u32, completed: u32, total_pages: u32) -> Self {
        Self {
            status: JobStatus::Failure {
                error: error.into(),
            },
            current_page,
            total_pages,
            progress_percent: progress_percent(completed, total_pages),
            updated_at: Utc::now(),
        }
    }

    /// CANCELLED after `completed` fully processed pages.
    pub fn cancelled(completed: u32, total_pages: u32) -> Self {
        Self {
            status: JobStatus::Cancelled,
            current_page: completed,
            total_pages,
            progress_percent: progress_percent(completed, total_pages),
            updated_at: Utc::now(),
        }
    }

    pub fn result(&self) -> Option<&str> {
        match &self.status {
            JobStatus::Success { result } => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            JobStatus::Failure { error } => Some(error),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// `round(completed / total * 100)`, clamped to 0..=100. Unknown totals report 0.
pub fn progress_percent(completed: u32, total_pages: u32) -> u8 {
    if total_pages == 0 {
        return 0;
    }
    let pct = (f64::from(completed) / f64::from(total_pages) * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Declared kind of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Pdf,
    Image,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Image => "image",
        }
    }

    /// Detect the kind from magic bytes, falling back to the file name.
    pub fn detect(bytes: &[u8], file_name: Option<&str>) -> Option<Self> {
        if let Some(kind) = infer::get(bytes) {
            let mime = kind.mime_type();
            if mime == "application/pdf" {
                return Some(Self::Pdf);
            }
            if mime.starts_with("image/") {
                return Some(Self::Image);
            }
        }

        let guess = mime_guess::from_path(file_name?).first()?;
        if guess == mime_guess::mime::APPLICATION_PDF {
            Some(Self::Pdf)
        } else if guess.type_() == mime_guess::mime::IMAGE {
            Some(Self::Image)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A submitted job as handed from the HTTP layer to a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub job_id: String,
    pub file_name: String,
    pub kind: ContentKind,
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,
}

impl JobRequest {
    /// Create a request under a freshly generated job id.
    pub fn new(file_name: impl Into<String>, kind: ContentKind, bytes: Vec<u8>) -> Self {
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            file_name: file_name.into(),
            kind,
            bytes,
        }
    }
}

/// Document bytes travel through broker payloads as base64 text.
mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percent_rounds() {
        assert_eq!(progress_percent(0, 3), 0);
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(2, 3), 67);
        assert_eq!(progress_percent(3, 3), 100);
        assert_eq!(progress_percent(1, 0), 0);
    }

    #[test]
    fn test_record_serializes_with_state_tag() {
        let record = JobRecord::success("<div>hi</div>".to_string(), 2);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["state"], "SUCCESS");
        assert_eq!(json["result"], "<div>hi</div>");
        assert_eq!(json["progress_percent"], 100);
        assert!(json.get("error").is_none());

        let back: JobRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_failure_has_no_result() {
        let record = JobRecord::failure("engine timeout", 2, 1, 4);
        assert_eq!(record.result(), None);
        assert_eq!(record.error(), Some("engine timeout"));
        assert!(record.is_terminal());
        assert_eq!(record.progress_percent, 25);
    }

    #[test]
    fn test_cancelled_reports_completed_pages() {
        let record = JobRecord::cancelled(2, 5);
        assert_eq!(record.current_page, 2);
        assert_eq!(record.progress_percent, 40);
        assert_eq!(record.status.as_str(), "CANCELLED");
    }

    #[test]
    fn test_detect_pdf_by_magic() {
        let bytes = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n";
        assert_eq!(ContentKind::detect(bytes, None), Some(ContentKind::Pdf));
    }

    #[test]
    fn test_detect_falls_back_to_file_name() {
        assert_eq!(
            ContentKind::detect(b"not really", Some("scan.JPG")),
            Some(ContentKind::Image)
        );
        assert_eq!(
            ContentKind::detect(b"not really", Some("report.pdf")),
            Some(ContentKind::Pdf)
        );
        assert_eq!(ContentKind::detect(b"plain text", Some("notes.txt")), None);
        assert_eq!(ContentKind::detect(b"plain text", None), None);
    }

    #[test]
    fn test_job_request_payload_roundtrip() {
        let request = JobRequest::new("a.png", ContentKind::Image, vec![0, 159, 146, 150]);
        let json = serde_json::to_string(&request).unwrap();
        let back: JobRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.job_id, request.job_id);
        assert_eq!(back.bytes, request.bytes);
        assert_eq!(back.kind, ContentKind::Image);
    }
}
