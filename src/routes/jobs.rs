//! Job Routes
//!
//! Endpoints:
//! - POST /api/v1/upload?use_ocr=bool - Upload a PDF and extract its text
//! - POST /api/v1/convert - Synthesize the extracted text
//! - GET /api/v1/download/:job_id - Fetch the finished audiobook
//! - GET /api/v1/preview/:job_id?limit=N - Preview the extracted text
//! - GET /api/v1/jobs/:job_id - Job status
//! - DELETE /api/v1/jobs/:job_id - Cancel and delete a job

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::extract::{Document, ExtractionMethod};
use crate::jobs::{Job, JobId, TextPreview};
use crate::speech::DEFAULT_VOICE;
use crate::state::AppState;

const DEFAULT_PREVIEW_LIMIT: usize = 1000;

/// Create the job router
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/convert", post(convert))
        .route("/download/:job_id", get(download))
        .route("/preview/:job_id", get(preview))
        .route("/jobs/:job_id", get(get_job).delete(delete_job))
}

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct UploadParams {
    #[serde(default)]
    pub use_ocr: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub job_id: JobId,
    pub filename: String,
    pub preview: String,
    pub total_chars: usize,
    pub status: String,
    pub extraction_method: ExtractionMethod,
}

#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub job_id: String,
    pub voice: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConvertResponse {
    pub job_id: JobId,
    pub audio_url: String,
    pub status: String,
    pub chunks: usize,
}

#[derive(Debug, Deserialize)]
pub struct PreviewParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub job_id: JobId,
    pub status: &'static str,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/upload
///
/// Accepts a multipart `file` field holding a `.pdf`.
async fn upload(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidRequest(format!("Failed to read upload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if !filename.to_ascii_lowercase().ends_with(".pdf") {
            return Err(AppError::InvalidRequest(
                "Only PDF files are accepted".to_string(),
            ));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidRequest(format!("Failed to read file data: {}", e)))?;
        upload = Some((filename, data));
        break;
    }

    let (filename, data) =
        upload.ok_or_else(|| AppError::InvalidRequest("Missing multipart field 'file'".to_string()))?;
    tracing::debug!(filename = %filename, bytes = data.len(), use_ocr = params.use_ocr, "Received upload");

    let coordinator = state.coordinator();
    let job = coordinator
        .submit(&filename, Document::new(data), params.use_ocr)
        .await?;

    let limit = state.config().pipeline.preview_chars;
    let TextPreview {
        mut preview,
        remaining,
        total,
    } = coordinator.preview(&job.id, limit).await?;
    if remaining > 0 {
        preview.push_str("...");
    }

    Ok(Json(UploadResponse {
        job_id: job.id,
        filename,
        preview,
        total_chars: total,
        status: job.state.as_str().to_string(),
        extraction_method: job.extraction_method.unwrap_or(ExtractionMethod::Direct),
    }))
}

/// POST /api/v1/convert
async fn convert(
    State(state): State<AppState>,
    Json(request): Json<ConvertRequest>,
) -> Result<Json<ConvertResponse>> {
    let job_id = JobId::parse(&request.job_id)?;
    let voice = request.voice.as_deref().unwrap_or(DEFAULT_VOICE);

    let job = state.coordinator().convert(&job_id, voice).await?;

    Ok(Json(ConvertResponse {
        audio_url: format!("/api/v1/download/{}", job.id),
        job_id: job.id,
        status: "completed".to_string(),
        chunks: job.chunks.unwrap_or_default(),
    }))
}

/// GET /api/v1/download/:job_id
async fn download(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse> {
    let job_id = JobId::parse(&job_id)?;
    let audio = state.coordinator().audio(&job_id).await?;

    let disposition = format!(
        "attachment; filename=\"audiobook_{}.{}\"",
        job_id,
        audio.format.extension()
    );

    Ok((
        [
            (header::CONTENT_TYPE, audio.format.mime_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        audio.data,
    ))
}

/// GET /api/v1/preview/:job_id
async fn preview(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(params): Query<PreviewParams>,
) -> Result<Json<TextPreview>> {
    let job_id = JobId::parse(&job_id)?;
    let limit = params.limit.unwrap_or(DEFAULT_PREVIEW_LIMIT);

    Ok(Json(state.coordinator().preview(&job_id, limit).await?))
}

/// GET /api/v1/jobs/:job_id
async fn get_job(State(state): State<AppState>, Path(job_id): Path<String>) -> Result<Json<Job>> {
    let job_id = JobId::parse(&job_id)?;
    Ok(Json(state.coordinator().job(&job_id).await?))
}

/// DELETE /api/v1/jobs/:job_id
async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let job_id = JobId::parse(&job_id)?;
    let job = state.coordinator().delete(&job_id).await?;

    Ok(Json(DeleteResponse {
        job_id: job.id,
        status: "deleted",
    }))
}
