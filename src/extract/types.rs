//! Extraction types

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::ocr::OcrError;

/// Raw PDF bytes as uploaded
#[derive(Debug, Clone)]
pub struct Document {
    data: Bytes,
}

impl Document {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Cheap handle on the underlying bytes
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// How the text was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    /// PDF text layer
    Direct,
    /// Optical character recognition of rendered pages
    Ocr,
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Ocr => f.write_str("ocr"),
        }
    }
}

/// Text of a whole document, pages concatenated in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub method: ExtractionMethod,
    pub page_count: usize,
}

impl ExtractedText {
    /// Length in characters
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// Unreadable document, or neither method produced any text
    #[error("no text could be extracted from the document")]
    NoTextFound,

    #[error("OCR failed: {0}")]
    Ocr(#[from] OcrError),
}

impl ExtractionError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoTextFound => "no-text-found",
            Self::Ocr(_) => "ocr-backend-failure",
        }
    }
}
