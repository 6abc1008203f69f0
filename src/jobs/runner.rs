//! Job runner: drives one OCR job through its state machine.
//!
//! `PENDING -> PROGRESS* -> SUCCESS | FAILURE | CANCELLED`
//!
//! For page p of n the runner
//! 1. consumes the cancellation flag; if it was set, writes CANCELLED after p-1 pages
//! 2. writes PROGRESS at page p (percent from p-1 completed pages)
//! 3. renders and OCRs page p; an error writes FAILURE and drops all text
//! 4. appends the page text and writes PROGRESS with p pages completed
//!
//! After the last page the text is post-processed and SUCCESS is written.
//! Every write for a job comes from this runner, in page order, and nothing
//! is written after the terminal state.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::queue::QueueError;
use super::store::{JobStateStore, StoreError};
use crate::models::{JobRecord, JobRequest};
use crate::ocr::{OcrBackend, OcrError};
use crate::raster::{PageRasterizer, RasterError, RasterSource};
use crate::text::{SpellCheckError, TextPostProcessor, PAGE_SEPARATOR};

/// Job-level errors.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Unsupported file kind: {0}")]
    UnsupportedFileKind(String),

    #[error("Rasterization failed: {0}")]
    Rasterization(#[from] RasterError),

    #[error("OCR failed on page {page}: {source}")]
    OcrEngine {
        page: u32,
        #[source]
        source: OcrError,
    },

    #[error("Spellcheck failed: {0}")]
    SpellCheck(#[from] SpellCheckError),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded { pages: u32 },
    Failed { error: String },
    /// Stopped at a page boundary after `completed` pages.
    Cancelled { completed: u32 },
}

/// Runs jobs against a shared store, rasterizer, OCR backend and post-processor.
#[derive(Clone)]
pub struct JobRunner {
    store: Arc<dyn JobStateStore>,
    rasterizer: Arc<dyn PageRasterizer>,
    ocr: Arc<dyn OcrBackend>,
    post: TextPostProcessor,
}

impl JobRunner {
    pub fn new(
        store: Arc<dyn JobStateStore>,
        rasterizer: Arc<dyn PageRasterizer>,
        ocr: Arc<dyn OcrBackend>,
        post: TextPostProcessor,
    ) -> Self {
        Self {
            store,
            rasterizer,
            ocr,
            post,
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStateStore> {
        &self.store
    }

    /// Run a job to its terminal state.
    pub async fn run(&self, request: JobRequest) -> JobOutcome {
        let JobRequest {
            job_id,
            file_name,
            kind,
            bytes,
        } = request;

        info!(job_id = %job_id, file = %file_name, kind = %kind, "Starting OCR job");

        let source = match self.rasterizer.open(bytes, kind).await {
            Ok(source) => source,
            Err(e) => {
                // Page count unknown: total_pages stays 0.
                let err = JobError::Rasterization(e);
                return self.fail(&job_id, err, 0, 0, 0).await;
            }
        };

        let total = source.page_count();
        let mut text = String::new();

        for page in 1..=total {
            let completed = page - 1;

            if self.cancel_requested(&job_id).await {
                info!(job_id = %job_id, completed, total_pages = total, "Job cancelled");
                self.write(&job_id, &JobRecord::cancelled(completed, total))
                    .await;
                return JobOutcome::Cancelled { completed };
            }

            self.write(&job_id, &JobRecord::progress(page, completed, total))
                .await;

            match self.process_page(source.as_ref(), page).await {
                Ok(page_text) => {
                    text.push_str(&page_text);
                    text.push_str(PAGE_SEPARATOR);
                }
                Err(e) => return self.fail(&job_id, e, page, completed, total).await,
            }

            debug!(job_id = %job_id, page, total_pages = total, "Page done");
            self.write(&job_id, &JobRecord::progress(page, page, total))
                .await;
        }

        match self.post.process(&text).await {
            Ok(result) => {
                self.write(&job_id, &JobRecord::success(result, total)).await;
                info!(job_id = %job_id, total_pages = total, "OCR job succeeded");
                JobOutcome::Succeeded { pages: total }
            }
            Err(e) => {
                self.fail(&job_id, JobError::SpellCheck(e), total, total, total)
                    .await
            }
        }
    }

    /// Render page `page` and OCR it. The image is dropped on return.
    async fn process_page(
        &self,
        source: &dyn RasterSource,
        page: u32,
    ) -> Result<String, JobError> {
        let image = source.render_page(page).await?;
        let result = self
            .ocr
            .recognize(&image)
            .await
            .map_err(|source| JobError::OcrEngine { page, source })?;

        debug!(
            page,
            backend = %result.backend,
            ms = result.processing_time_ms,
            chars = result.text.len(),
            "OCR page"
        );
        Ok(result.text)
    }

    async fn cancel_requested(&self, job_id: &str) -> bool {
        match self.store.get_and_clear_cancel_flag(job_id).await {
            Ok(flag) => flag,
            Err(e) => {
                warn!(job_id = %job_id, "Failed to read cancel flag: {}", e);
                false
            }
        }
    }

    async fn fail(
        &self,
        job_id: &str,
        err: JobError,
        current_page: u32,
        completed: u32,
        total: u32,
    ) -> JobOutcome {
        let error = err.to_string();
        error!(job_id = %job_id, page = current_page, total_pages = total, "OCR job failed: {}", error);
        self.write(
            job_id,
            &JobRecord::failure(error.clone(), current_page, completed, total),
        )
        .await;
        JobOutcome::Failed { error }
    }

    /// Store errors are logged, not fatal: the job keeps going so a later
    /// write can still land.
    async fn write(&self, job_id: &str, record: &JobRecord) {
        if let Err(e) = self.store.set_state(job_id, record).await {
            warn!(job_id = %job_id, state = %record.status, "Failed to write job state: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::InMemoryJobStore;
    use crate::models::{ContentKind, JobStatus};
    use crate::ocr::OcrBackendType;
    use crate::raster::PageImage;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Pages(u32);

    #[async_trait]
    impl RasterSource for Pages {
        fn page_count(&self) -> u32 {
            self.0
        }

        async fn render_page(&self, page: u32) -> Result<PageImage, RasterError> {
            Ok(PageImage {
                number: page,
                width_pt: 595.0,
                height_pt: 842.0,
                png: Vec::new(),
            })
        }
    }

    struct FakeRasterizer(Option<u32>);

    #[async_trait]
    impl PageRasterizer for FakeRasterizer {
        async fn open(
            &self,
            _bytes: Vec<u8>,
            _kind: ContentKind,
        ) -> Result<Box<dyn RasterSource>, RasterError> {
            match self.0 {
                Some(n) => Ok(Box::new(Pages(n))),
                None => Err(RasterError::Malformed("not a pdf".to_string())),
            }
        }
    }

    struct EchoOcr;

    #[async_trait]
    impl OcrBackend for EchoOcr {
        fn backend_type(&self) -> OcrBackendType {
            OcrBackendType::Tesseract
        }

        fn is_available(&self) -> bool {
            true
        }

        fn availability_hint(&self) -> String {
            String::new()
        }

        async fn run_ocr(&self, page: &PageImage) -> Result<String, OcrError> {
            Ok(format!("page {}", page.number))
        }
    }

    fn runner(store: &InMemoryJobStore, pages: Option<u32>) -> JobRunner {
        JobRunner::new(
            Arc::new(store.clone()),
            Arc::new(FakeRasterizer(pages)),
            Arc::new(EchoOcr),
            TextPostProcessor::with_default_rules(),
        )
    }

    #[tokio::test]
    async fn test_pages_are_joined_in_order() {
        let store = InMemoryJobStore::default();
        let request = JobRequest::new("doc.pdf", ContentKind::Pdf, vec![]);
        let id = request.job_id.clone();

        let outcome = runner(&store, Some(2)).run(request).await;
        assert_eq!(outcome, JobOutcome::Succeeded { pages: 2 });

        let record = store.get_state(&id).await.unwrap().unwrap();
        let result = record.result().unwrap();
        let first = result.find("page 1").unwrap();
        let second = result.find("page 2").unwrap();
        assert!(first < second);
        assert_eq!(record.progress_percent, 100);
        assert_eq!(record.current_page, 2);
    }

    #[tokio::test]
    async fn test_open_failure_leaves_total_unknown() {
        let store = InMemoryJobStore::default();
        let request = JobRequest::new("doc.pdf", ContentKind::Pdf, vec![]);
        let id = request.job_id.clone();

        let outcome = runner(&store, None).run(request).await;
        assert!(matches!(outcome, JobOutcome::Failed { .. }));

        let record = store.get_state(&id).await.unwrap().unwrap();
        assert!(matches!(record.status, JobStatus::Failure { .. }));
        assert_eq!(record.total_pages, 0);
        assert!(record.error().unwrap().contains("not a pdf"));
    }

    #[tokio::test]
    async fn test_cancel_before_start_stops_at_page_zero() {
        let store = InMemoryJobStore::default();
        let request = JobRequest::new("doc.pdf", ContentKind::Pdf, vec![]);
        let id = request.job_id.clone();
        store
            .set_cancel_flag(&id, Duration::from_secs(600))
            .await
            .unwrap();

        let outcome = runner(&store, Some(3)).run(request).await;
        assert_eq!(outcome, JobOutcome::Cancelled { completed: 0 });

        let record = store.get_state(&id).await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Cancelled);
        assert_eq!(record.current_page, 0);
        assert_eq!(record.progress_percent, 0);
        // Flag was consumed.
        assert!(!store.get_and_clear_cancel_flag(&id).await.unwrap());
    }
}
