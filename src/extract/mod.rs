//! Text extraction
//!
//! Direct text-layer extraction with an OCR fallback for scanned documents.

mod extractor;
mod types;

pub use extractor::{ExtractorConfig, TextExtractor};
pub use types::{Document, ExtractedText, ExtractionError, ExtractionMethod};
