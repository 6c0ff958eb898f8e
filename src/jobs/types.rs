//! Job record, lifecycle states and pipeline errors

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::id::JobId;
use crate::audio::AssemblyError;
use crate::extract::{ExtractionError, ExtractionMethod};
use crate::speech::{InvalidVoiceError, SynthesisError};
use crate::storage::StorageError;

/// Stable reason attached to a failed job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    /// The document is unreadable or holds no recoverable text
    BadInputDocument,
    /// The requested voice is not supported
    BadVoiceSelection,
    /// The synthesis backend rejected a call or could not be reached
    SynthesisBackendFailure,
    /// No OCR provider could process the rendered pages
    OcrBackendFailure,
    /// A bookkeeping defect or storage failure inside the service
    InternalFailure,
    Cancelled,
}

impl FailureReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadInputDocument => "bad-input-document",
            Self::BadVoiceSelection => "bad-voice-selection",
            Self::SynthesisBackendFailure => "synthesis-backend-failure",
            Self::OcrBackendFailure => "ocr-backend-failure",
            Self::InternalFailure => "internal-failure",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Job lifecycle: `created -> text_extracted -> audio_ready`, or `failed`
/// from any non-terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum JobState {
    Created,
    TextExtracted,
    AudioReady,
    Failed(FailureReason),
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::TextExtracted => "text_extracted",
            Self::AudioReady => "audio_ready",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::AudioReady | Self::Failed(_))
    }
}

/// Chunk synthesis progress of a running conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub chunks_done: usize,
    pub chunks_total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    pub filename: String,
    #[serde(flatten)]
    pub state: JobState,
    pub extraction_method: Option<ExtractionMethod>,
    pub page_count: Option<usize>,
    pub total_chars: Option<usize>,
    pub voice: Option<String>,
    /// Set while a conversion is running
    pub progress: Option<Progress>,
    pub chunks: Option<usize>,
    pub duration_secs: Option<f64>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: JobId, filename: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            filename: filename.into(),
            state: JobState::Created,
            extraction_method: None,
            page_count: None,
            total_chars: None,
            voice: None,
            progress: None,
            chunks: None,
            duration_secs: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn fail(&mut self, reason: FailureReason, message: impl Into<String>) {
        self.state = JobState::Failed(reason);
        self.progress = None;
        self.error = Some(message.into());
    }
}

/// First `limit` characters of a job's text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextPreview {
    pub preview: String,
    /// Characters not included in the preview
    pub remaining: usize,
    pub total: usize,
}

impl TextPreview {
    pub fn new(text: &str, limit: usize) -> Self {
        let total = text.chars().count();
        let preview = crate::chunking::truncate_chars(text, limit).to_string();
        Self {
            remaining: total - preview.chars().count(),
            preview,
            total,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Job {0} not found")]
    NotFound(JobId),

    #[error("Job {0} is already being processed")]
    Busy(JobId),

    #[error("Job {job_id} is {state}, expected {expected}")]
    InvalidState {
        job_id: JobId,
        state: &'static str,
        expected: &'static str,
    },

    #[error("Audio for job {0} is not ready")]
    AudioNotReady(JobId),

    #[error("Job {0} has no speakable text left after truncation")]
    NothingToSynthesize(JobId),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    InvalidVoice(#[from] InvalidVoiceError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error("Audio assembly failed: {0}")]
    Assembly(#[from] AssemblyError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Task failed: {0}")]
    Task(String),

    #[error("Job was cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Reason recorded on the job when this error ends it
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            Self::Extraction(ExtractionError::NoTextFound) | Self::NothingToSynthesize(_) => {
                FailureReason::BadInputDocument
            }
            Self::Extraction(ExtractionError::Ocr(_)) => FailureReason::OcrBackendFailure,
            Self::InvalidVoice(_) | Self::Synthesis(SynthesisError::InvalidVoice(_)) => {
                FailureReason::BadVoiceSelection
            }
            Self::Synthesis(_) => FailureReason::SynthesisBackendFailure,
            Self::Cancelled => FailureReason::Cancelled,
            _ => FailureReason::InternalFailure,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "job-not-found",
            Self::Busy(_) => "job-busy",
            Self::InvalidState { .. } => "invalid-job-state",
            Self::AudioNotReady(_) => "audio-not-ready",
            Self::NothingToSynthesize(_) => "no-speakable-text",
            Self::Storage(_) => "storage-failure",
            other => other.failure_reason().code(),
        }
    }
}
