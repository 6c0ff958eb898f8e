//! Voice listing

use axum::{extract::State, Json};
use serde::Serialize;

use crate::speech::{Voice, DEFAULT_VOICE};
use crate::state::AppState;

#[derive(Serialize)]
pub struct VoicesResponse {
    voices: Vec<Voice>,
    default: &'static str,
}

/// GET /api/v1/voices
pub async fn list_voices(State(state): State<AppState>) -> Json<VoicesResponse> {
    Json(VoicesResponse {
        voices: state.coordinator().voices().all().to_vec(),
        default: DEFAULT_VOICE,
    })
}
