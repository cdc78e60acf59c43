use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::Json,
};

use converter_application::{ProxyUploadRequest, ProxyUploadResponse};

use crate::error::{error_mapper, HttpError};
use crate::handlers::form::read_form;
use crate::state::AppState;

pub async fn proxy_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<ProxyUploadResponse>), HttpError> {
    let (file, _, key) = read_form(multipart).await?.single_file()?;
    tracing::info!(
        file_name = %file.file_name,
        size_bytes = file.bytes.len(),
        key = key.as_deref().unwrap_or("generated"),
        "received proxy upload request"
    );

    match state.upload.upload(ProxyUploadRequest { file, key }).await {
        Ok(result) => {
            tracing::info!(
                key = %result.key,
                attempts = result.attempts,
                "proxy upload completed"
            );
            Ok((StatusCode::OK, Json(result)))
        }
        Err(error) => {
            tracing::error!(error = %error, "proxy upload failed");
            Err(error_mapper(error))
        }
    }
}
