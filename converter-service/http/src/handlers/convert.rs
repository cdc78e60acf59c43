use axum::{
    extract::{multipart::MultipartRejection, rejection::QueryRejection, Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;

use converter_application::{
    BatchConvertRequest, BatchConvertResponse, ConvertAudioRequest, ConvertAudioResponse,
    DownloadConversionRequest,
};

use crate::error::{error_mapper, HttpError};
use crate::handlers::{flag, form::read_form, wav_attachment};
use crate::state::AppState;

pub async fn convert_audio(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<ConvertAudioResponse>), HttpError> {
    let (file, options, _) = read_form(multipart).await?.single_file()?;

    tracing::info!(
        file_name = %file.file_name,
        size_bytes = file.bytes.len(),
        content_type = file.content_type.as_deref().unwrap_or("unknown"),
        "received convert request"
    );

    match state
        .convert
        .convert(ConvertAudioRequest { file, options })
        .await
    {
        Ok(result) => {
            tracing::info!(
                file_id = %result.file_id,
                engine = %result.engine,
                degraded = result.degraded,
                size_bytes = result.size,
                "convert request completed"
            );
            Ok((StatusCode::OK, Json(result)))
        }
        Err(error) => {
            tracing::error!(error = %error, "convert request failed");
            Err(error_mapper(error))
        }
    }
}

pub async fn convert_batch(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<BatchConvertResponse>), HttpError> {
    let form = read_form(multipart).await?;
    tracing::info!(file_count = form.files.len(), "received batch convert request");

    let request = BatchConvertRequest {
        files: form.files,
        options: form.options,
    };
    match state.convert.convert_batch(request).await {
        Ok(result) => {
            let failed = result.results.iter().filter(|item| !item.ok).count();
            tracing::info!(
                file_count = result.results.len(),
                failed_count = failed,
                "batch convert request completed"
            );
            Ok((StatusCode::OK, Json(result)))
        }
        Err(error) => {
            tracing::error!(error = %error, "batch convert request failed");
            Err(error_mapper(error))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionQuery {
    pub file_id: Option<String>,
    pub check: Option<String>,
    pub rebuild: Option<String>,
}

/// `GET /api/convert`: metadata when `check` is set, the WAV bytes otherwise.
pub async fn download_conversion(
    State(state): State<AppState>,
    query: Result<Query<ConversionQuery>, QueryRejection>,
) -> Result<Response, HttpError> {
    let Query(query) = query.map_err(|rejection| HttpError::bad_request(rejection.body_text()))?;
    let file_id = query
        .file_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| HttpError::bad_request("the `fileId` query parameter is required"))?;

    if flag(query.check.as_deref()) {
        let result = state.retrieve.check(&file_id).await.map_err(|error| {
            tracing::error!(error = %error, file_id = %file_id, "conversion check failed");
            error_mapper(error)
        })?;
        return Ok(Json(result).into_response());
    }

    let request = DownloadConversionRequest {
        file_id,
        rebuild: flag(query.rebuild.as_deref()),
    };
    let download = state.retrieve.download(request).await.map_err(|error| {
        tracing::warn!(error = %error, "conversion download failed");
        error_mapper(error)
    })?;

    tracing::info!(
        file_id = %download.file_id,
        size_bytes = download.bytes.len(),
        degraded = download.degraded,
        "streaming converted file"
    );
    wav_attachment(&download.file_name, download.bytes, download.degraded)
}
