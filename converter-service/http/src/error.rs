use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use converter_application::ApplicationError;
use converter_domain::DomainError;
use serde_json::json;

/// Ways the client can still get at a converted file when the bucket upload fails.
pub const UPLOAD_ALTERNATIVES: [&str; 3] = ["retry", "open_in_new_window", "download_directly"];

#[derive(Debug)]
pub enum HttpError {
    BadRequest { error: String, detail: String },
    PayloadTooLarge { error: String, detail: String },
    Unprocessable { error: String, detail: String },
    NotFound { error: String, detail: String },
    Gone { error: String, detail: String },
    UploadFailed { detail: String },
    Unavailable { error: String, detail: String },
    Internal { error: String, detail: String },
}

impl HttpError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        HttpError::BadRequest {
            error: "ValidationError".to_string(),
            detail: detail.into(),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            HttpError::BadRequest { error, detail } => {
                (StatusCode::BAD_REQUEST, json!({ "error": error, "detail": detail }))
            }
            HttpError::PayloadTooLarge { error, detail } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                json!({ "error": error, "detail": detail }),
            ),
            HttpError::Unprocessable { error, detail } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": error, "detail": detail }),
            ),
            HttpError::NotFound { error, detail } => {
                (StatusCode::NOT_FOUND, json!({ "error": error, "detail": detail }))
            }
            HttpError::Gone { error, detail } => {
                (StatusCode::GONE, json!({ "error": error, "detail": detail }))
            }
            HttpError::UploadFailed { detail } => (
                StatusCode::BAD_GATEWAY,
                json!({
                    "error": "UploadFailure",
                    "detail": detail,
                    "alternatives": UPLOAD_ALTERNATIVES,
                }),
            ),
            HttpError::Unavailable { error, detail } => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": error, "detail": detail }),
            ),
            HttpError::Internal { error, detail } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": error, "detail": detail }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

pub fn error_mapper(error: ApplicationError) -> HttpError {
    let code = error.code().to_string();
    let detail = error.to_string();

    match error {
        ApplicationError::Validation(_) => HttpError::BadRequest {
            error: code,
            detail,
        },
        ApplicationError::Internal(_) => HttpError::Internal {
            error: code,
            detail,
        },
        ApplicationError::Domain(domain) => match domain {
            DomainError::InvalidFileType(_)
            | DomainError::InvalidSettings(_)
            | DomainError::InvalidTrimRange(_)
            | DomainError::InvalidIdentifier(_) => HttpError::BadRequest {
                error: code,
                detail,
            },
            DomainError::FileTooLarge { .. } => HttpError::PayloadTooLarge {
                error: code,
                detail,
            },
            DomainError::DecodeFailure(_) | DomainError::ConversionFailed(_) => {
                HttpError::Unprocessable {
                    error: code,
                    detail,
                }
            }
            DomainError::FileNotFound(_) | DomainError::ShareNotFound(_) => HttpError::NotFound {
                error: code,
                detail,
            },
            DomainError::ShareExpired(_) => HttpError::Gone {
                error: code,
                detail,
            },
            DomainError::UploadFailure { .. } => HttpError::UploadFailed { detail },
            DomainError::ExternalService { .. } => HttpError::Unavailable {
                error: code,
                detail,
            },
            DomainError::StorageWriteFailure(_) | DomainError::Internal(_) => {
                HttpError::Internal {
                    error: code,
                    detail,
                }
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(error: DomainError) -> StatusCode {
        error_mapper(ApplicationError::Domain(error))
            .into_response()
            .status()
    }

    #[test]
    fn domain_errors_map_to_documented_statuses() {
        assert_eq!(
            status_of(DomainError::InvalidFileType("text/plain".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(DomainError::FileTooLarge { size: 10, limit: 5 }),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            status_of(DomainError::DecodeFailure("garbage".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(DomainError::ShareNotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(DomainError::ShareExpired("x".into())),
            StatusCode::GONE
        );
        assert_eq!(
            status_of(DomainError::UploadFailure {
                attempts: 3,
                message: "timeout".into()
            }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(DomainError::external_service_error("object-storage", "off")),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(DomainError::StorageWriteFailure("disk full".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn validation_errors_are_bad_requests() {
        let response = error_mapper(ApplicationError::Validation("file_name: length".into()))
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
