use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{Json, Response},
};
use serde::Deserialize;

use converter_application::{CreateShareRequest, CreateShareResponse, ShareDetailsResponse};

use crate::error::{error_mapper, HttpError};
use crate::extract::ValidatedJson;
use crate::handlers::wav_attachment;
use crate::state::AppState;

pub async fn create_share(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreateShareRequest>,
) -> Result<(StatusCode, Json<CreateShareResponse>), HttpError> {
    tracing::info!(file_id = %request.file_id, "received share request");

    match state.share.create_share(request).await {
        Ok(result) => {
            tracing::info!(share_id = %result.share_id, "share created");
            Ok((StatusCode::CREATED, Json(result)))
        }
        Err(error) => {
            tracing::error!(error = %error, "share request failed");
            Err(error_mapper(error))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ShareQuery {
    pub id: Option<String>,
}

pub async fn get_share(
    State(state): State<AppState>,
    query: Result<Query<ShareQuery>, QueryRejection>,
) -> Result<Json<ShareDetailsResponse>, HttpError> {
    let Query(query) = query.map_err(|rejection| HttpError::bad_request(rejection.body_text()))?;
    let share_id = query
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| HttpError::bad_request("the `id` query parameter is required"))?;

    state.share.get_share(&share_id).await.map(Json).map_err(|error| {
        tracing::warn!(error = %error, share_id = %share_id, "share lookup failed");
        error_mapper(error)
    })
}

pub async fn download_share(
    State(state): State<AppState>,
    Path(share_id): Path<String>,
) -> Result<Response, HttpError> {
    let download = state.share.download_share(&share_id).await.map_err(|error| {
        tracing::warn!(error = %error, share_id = %share_id, "shared download failed");
        error_mapper(error)
    })?;

    tracing::info!(
        share_id = %download.share_id,
        size_bytes = download.bytes.len(),
        "streaming shared file"
    );
    wav_attachment(&download.file_name, download.bytes, false)
}
