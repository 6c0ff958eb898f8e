//! OCR for pages with no usable text layer
//!
//! Pages are rendered to PNG by the PDF layer and handed to an ordered list
//! of providers: a local `tesseract` binary and an Ollama vision model. The
//! first available provider that succeeds wins.

mod provider;
mod service;
mod types;

pub use provider::{OcrProviderTrait, OllamaProvider, TesseractProvider};
pub use service::{OcrService, OcrServiceConfig, OcrSession};
pub use types::{OcrError, OcrProvider, OcrResult};
