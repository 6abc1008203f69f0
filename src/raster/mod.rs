//! Page rasterization.
//!
//! Turns an uploaded document into an ordered, 1-indexed sequence of raster
//! pages at a fixed 2x oversampling factor:
//! - PDF documents are rendered one page at a time with poppler
//!   (`pdfinfo` for geometry, `pdftoppm` for pixels)
//! - Bare images are placed on a single synthetic A4 page
//!
//! Pages are rendered lazily so only one page image is alive at a time.

mod image;
mod pdf;

pub use self::image::ImageSource;
pub use self::pdf::{poppler_available, PdfSource};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::ContentKind;

/// Oversampling factor applied to the page geometry (72 dpi -> 144 dpi).
pub const RENDER_SCALE: f32 = 2.0;

/// ISO A4 width in PDF points.
pub const A4_WIDTH_PT: f32 = 595.276;
/// ISO A4 height in PDF points.
pub const A4_HEIGHT_PT: f32 = 841.890;

/// Errors from page rasterization.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("Document has no pages")]
    Empty,

    #[error("Page {page} out of range (document has {total} pages)")]
    PageOutOfRange { page: u32, total: u32 },

    #[error("Failed to render page {page}: {message}")]
    Render { page: u32, message: String },

    #[error("Tool not available: {0}")]
    ToolNotAvailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] ::image::ImageError),
}

/// One rendered page. Lives only for the duration of that page's OCR.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 1-indexed page number.
    pub number: u32,
    /// Logical (visible) page width in points.
    pub width_pt: f32,
    /// Logical (visible) page height in points.
    pub height_pt: f32,
    /// PNG-encoded raster.
    pub png: Vec<u8>,
}

/// An opened document whose pages can be rendered on demand.
#[async_trait]
pub trait RasterSource: Send + Sync {
    /// Number of pages; always at least 1 for an opened source.
    fn page_count(&self) -> u32;

    /// Render page `page` (1-indexed).
    async fn render_page(&self, page: u32) -> Result<PageImage, RasterError>;
}

/// Opens raw document bytes as a [`RasterSource`].
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    async fn open(
        &self,
        bytes: Vec<u8>,
        kind: ContentKind,
    ) -> Result<Box<dyn RasterSource>, RasterError>;
}

/// Default rasterizer: poppler for PDFs, the `image` crate for pictures.
#[derive(Debug, Clone, Default)]
pub struct DocumentRasterizer;

impl DocumentRasterizer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PageRasterizer for DocumentRasterizer {
    async fn open(
        &self,
        bytes: Vec<u8>,
        kind: ContentKind,
    ) -> Result<Box<dyn RasterSource>, RasterError> {
        match kind {
            ContentKind::Pdf => Ok(Box::new(PdfSource::open(&bytes).await?)),
            ContentKind::Image => {
                let source = tokio::task::spawn_blocking(move || ImageSource::compose(&bytes))
                    .await
                    .map_err(|e| RasterError::Malformed(format!("image task failed: {}", e)))??;
                Ok(Box::new(source))
            }
        }
    }
}

/// Pixel dimensions for a page of the given size in points at [`RENDER_SCALE`].
pub fn scaled_dimensions(width_pt: f32, height_pt: f32) -> (u32, u32) {
    (
        (width_pt * RENDER_SCALE).round() as u32,
        (height_pt * RENDER_SCALE).round() as u32,
    )
}
