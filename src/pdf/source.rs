//! PDF page access
//!
//! `PdfSource` is the seam between text extraction and the PDF engine: it
//! yields the text layer of each page and rasterises single pages for OCR.
//! `MuPdfSource` implements it with MuPDF.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use mupdf::{Colorspace, Document, Matrix};

use super::raster::encode_grayscale_png;

/// Timeout for reading the text layer of a whole document
const TEXT_TIMEOUT_SECS: u64 = 60;
/// Timeout for rendering one page
const RENDER_TIMEOUT_SECS: u64 = 30;

/// PDF engine errors
#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("Failed to open PDF: {0}")]
    Open(String),

    #[error("Page {page} not found (document has {count} pages)")]
    PageNotFound { page: usize, count: usize },

    #[error("Failed to render page {page}: {reason}")]
    Render { page: usize, reason: String },

    #[error("Image encoding error: {0}")]
    Image(String),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Task join error: {0}")]
    Task(String),

    #[error("MuPDF error: {0}")]
    MuPdf(String),
}

impl From<mupdf::Error> for PdfError {
    fn from(e: mupdf::Error) -> Self {
        PdfError::MuPdf(e.to_string())
    }
}

/// Page-level access to a PDF document
#[async_trait]
pub trait PdfSource: Send + Sync {
    /// Text layer of every page, in page order (possibly empty per page)
    async fn page_texts(&self, document: Bytes) -> Result<Vec<String>, PdfError>;

    /// Number of pages
    async fn page_count(&self, document: Bytes) -> Result<usize, PdfError>;

    /// Render one page (0-indexed) to an encoded image at `dpi`
    async fn render_page(&self, document: Bytes, page: usize, dpi: u32) -> Result<Vec<u8>, PdfError>;
}

/// MuPDF-backed page source
///
/// MuPDF's `fz_context` is not thread-safe and its documents are not `Send`,
/// so every operation opens a fresh document inside a blocking task.
#[derive(Debug, Clone, Default)]
pub struct MuPdfSource;

impl MuPdfSource {
    pub fn new() -> Self {
        Self
    }

    fn open(data: &[u8]) -> Result<Document, PdfError> {
        if data.is_empty() {
            return Err(PdfError::Open("empty document".to_string()));
        }
        Document::from_bytes(data, "application/pdf").map_err(|e| PdfError::Open(e.to_string()))
    }

    async fn run_blocking<F, R>(timeout_secs: u64, f: F) -> Result<R, PdfError>
    where
        F: FnOnce() -> Result<R, PdfError> + Send + 'static,
        R: Send + 'static,
    {
        let task = tokio::task::spawn_blocking(f);
        match tokio::time::timeout(Duration::from_secs(timeout_secs), task).await {
            Ok(joined) => joined.map_err(|e| PdfError::Task(e.to_string()))?,
            Err(_) => Err(PdfError::Timeout(timeout_secs)),
        }
    }
}

#[async_trait]
impl PdfSource for MuPdfSource {
    async fn page_texts(&self, document: Bytes) -> Result<Vec<String>, PdfError> {
        Self::run_blocking(TEXT_TIMEOUT_SECS, move || {
            let doc = Self::open(&document)?;
            let count = doc.page_count()?.max(0);

            let mut pages = Vec::with_capacity(count as usize);
            for index in 0..count {
                let page = doc.load_page(index)?;
                pages.push(page.to_text()?);
            }
            Ok(pages)
        })
        .await
    }

    async fn page_count(&self, document: Bytes) -> Result<usize, PdfError> {
        Self::run_blocking(TEXT_TIMEOUT_SECS, move || {
            let doc = Self::open(&document)?;
            Ok(doc.page_count()?.max(0) as usize)
        })
        .await
    }

    async fn render_page(&self, document: Bytes, page: usize, dpi: u32) -> Result<Vec<u8>, PdfError> {
        Self::run_blocking(RENDER_TIMEOUT_SECS, move || {
            let doc = Self::open(&document)?;
            let count = doc.page_count()?.max(0) as usize;
            if page >= count {
                return Err(PdfError::PageNotFound { page, count });
            }

            let scale = dpi as f32 / 72.0;
            let matrix = Matrix::new_scale(scale, scale);
            let colorspace = Colorspace::device_rgb();

            let pixmap = doc
                .load_page(page as i32)
                .and_then(|p| p.to_pixmap(&matrix, &colorspace, false, false))
                .map_err(|e| PdfError::Render {
                    page,
                    reason: e.to_string(),
                })?;

            encode_grayscale_png(&pixmap)
        })
        .await
    }
}
