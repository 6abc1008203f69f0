//! HTTP request handlers.

mod api;
mod helpers;
mod ocr;
mod text;

pub use api::health;
pub use helpers::{ApiError, ErrorResponse};
pub use ocr::{cancel_ocr, job_status, process_upload, CancelResponse, ProcessResponse};
pub use text::{find_misspelled_words, richtext_to_plaintext};
