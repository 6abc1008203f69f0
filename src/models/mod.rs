//! Data models for pageocr.

mod job;

pub use job::{progress_percent, ContentKind, JobRecord, JobRequest, JobStatus};
