//! OCR Types
//!
//! Defines types for OCR processing of rasterised PDF pages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// OCR provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrProvider {
    /// Tesseract OCR (local CLI)
    Tesseract,
    /// Ollama vision model (local LLM)
    Ollama,
}

impl Default for OcrProvider {
    fn default() -> Self {
        Self::Tesseract
    }
}

impl fmt::Display for OcrProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tesseract => f.write_str("tesseract"),
            Self::Ollama => f.write_str("ollama"),
        }
    }
}

impl FromStr for OcrProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tesseract" => Ok(Self::Tesseract),
            "ollama" => Ok(Self::Ollama),
            other => Err(format!("unknown OCR provider '{}'", other)),
        }
    }
}

/// OCR result
#[derive(Debug, Clone, Serialize)]
pub struct OcrResult {
    /// Recognized text, empty when nothing was found
    pub text: String,
    /// Confidence score (0-100)
    pub confidence: f64,
    /// Provider used
    pub provider: OcrProvider,
}

/// OCR error types
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR provider not available: {0}")]
    ProviderNotAvailable(String),

    #[error("OCR processing failed: {0}")]
    ProcessingError(String),

    #[error("API error: {0}")]
    ApiError(String),
}
