//! pageocr: page-granular, cancellable document OCR.
//!
//! An uploaded PDF or image is rasterized page by page, each page is sent to
//! an OCR engine, and the joined text is formatted for a rich-text editor.
//! Jobs run in workers; clients follow them through a shared state store
//! and may cancel them between pages.

pub mod cli;
pub mod config;
pub mod jobs;
pub mod models;
pub mod ocr;
pub mod raster;
pub mod server;
pub mod text;
