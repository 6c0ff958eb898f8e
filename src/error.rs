//! HTTP error type
//!
//! Every failure leaving a handler renders as `{ "error": ..., "code": ... }`
//! with a stable machine-readable code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::extract::ExtractionError;
use crate::jobs::{InvalidJobId, PipelineError};
use crate::speech::SynthesisError;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    InvalidJobId(#[from] InvalidJobId),

    #[error("{0}")]
    InvalidRequest(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidJobId(_) | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Pipeline(e) => match e {
                PipelineError::NotFound(_) | PipelineError::AudioNotReady(_) => StatusCode::NOT_FOUND,
                PipelineError::Busy(_) | PipelineError::InvalidState { .. } | PipelineError::Cancelled => {
                    StatusCode::CONFLICT
                }
                PipelineError::Extraction(ExtractionError::NoTextFound)
                | PipelineError::NothingToSynthesize(_) => StatusCode::UNPROCESSABLE_ENTITY,
                PipelineError::InvalidVoice(_)
                | PipelineError::Synthesis(SynthesisError::InvalidVoice(_)) => StatusCode::BAD_REQUEST,
                PipelineError::Extraction(ExtractionError::Ocr(_)) | PipelineError::Synthesis(_) => {
                    StatusCode::BAD_GATEWAY
                }
                PipelineError::Assembly(_) | PipelineError::Storage(_) | PipelineError::Task(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidJobId(_) | Self::InvalidRequest(_) => "invalid-request",
            Self::Pipeline(e) => e.code(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "Request failed: {}", self);
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: self.code(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AssemblyError;
    use crate::jobs::JobId;
    use crate::speech::InvalidVoiceError;

    #[test]
    fn test_status_and_code() {
        let cases = [
            (AppError::InvalidRequest("bad".into()), StatusCode::BAD_REQUEST, "invalid-request"),
            (
                AppError::from(JobId::parse("nope").unwrap_err()),
                StatusCode::BAD_REQUEST,
                "invalid-request",
            ),
            (
                AppError::from(PipelineError::NotFound(JobId::generate())),
                StatusCode::NOT_FOUND,
                "job-not-found",
            ),
            (
                AppError::from(PipelineError::Busy(JobId::generate())),
                StatusCode::CONFLICT,
                "job-busy",
            ),
            (
                AppError::from(PipelineError::from(ExtractionError::NoTextFound)),
                StatusCode::UNPROCESSABLE_ENTITY,
                "bad-input-document",
            ),
            (
                AppError::from(PipelineError::from(InvalidVoiceError { voice: "x".into() })),
                StatusCode::BAD_REQUEST,
                "bad-voice-selection",
            ),
            (
                AppError::from(PipelineError::from(SynthesisError::Backend {
                    status: 429,
                    message: "slow down".into(),
                })),
                StatusCode::BAD_GATEWAY,
                "synthesis-backend-failure",
            ),
            (
                AppError::from(PipelineError::NothingToSynthesize(JobId::generate())),
                StatusCode::UNPROCESSABLE_ENTITY,
                "no-speakable-text",
            ),
            (
                AppError::from(PipelineError::from(AssemblyError::NoSegments)),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal-failure",
            ),
        ];

        for (error, status, code) in cases {
            assert_eq!(error.status_code(), status, "{}", error);
            assert_eq!(error.code(), code, "{}", error);
        }
    }
}
