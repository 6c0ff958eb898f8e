//! HTTP routes
//!
//! - GET /health, GET /api/v1/health
//! - GET /api/v1/voices
//! - POST /api/v1/upload, POST /api/v1/convert
//! - GET /api/v1/download/:job_id, GET /api/v1/preview/:job_id
//! - GET /api/v1/jobs/:job_id, DELETE /api/v1/jobs/:job_id

pub mod health;
pub mod jobs;
pub mod voices;

use axum::{routing::get, Router};

use crate::state::AppState;

/// Build the application router (without tracing or CORS layers)
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health::health_check))
        .route("/voices", get(voices::list_voices))
        .merge(jobs::router(state.config().server.max_upload_bytes));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", api)
        .with_state(state)
}
