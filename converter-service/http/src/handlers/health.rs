use axum::{extract::State, response::Json};
use serde::Serialize;

use crate::state::{AppState, Capabilities};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub ffmpeg_available: bool,
    #[serde(flatten)]
    pub capabilities: Capabilities,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        ffmpeg_available: state.capabilities.ffmpeg_available(),
        capabilities: state.capabilities,
    })
}
