pub mod convert;
pub mod form;
pub mod health;
pub mod share;
pub mod upload;

pub use convert::*;
pub use health::*;
pub use share::*;
pub use upload::*;

use axum::{
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
};

use crate::error::HttpError;

pub const DEGRADED_HEADER: HeaderName = HeaderName::from_static("x-degraded");

/// `true`, `1` and `yes` switch a query flag on; anything else leaves it off.
pub(crate) fn flag(value: Option<&str>) -> bool {
    value.is_some_and(|value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes"
        )
    })
}

pub(crate) fn wav_attachment(
    file_name: &str,
    bytes: Vec<u8>,
    degraded: bool,
) -> Result<Response, HttpError> {
    let disposition = format!("attachment; filename=\"{}\"", header_safe(file_name));
    let disposition = HeaderValue::from_str(&disposition).map_err(|err| HttpError::Internal {
        error: "InternalError".to_string(),
        detail: err.to_string(),
    })?;

    let mut response = (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("audio/wav")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response();
    if degraded {
        response
            .headers_mut()
            .insert(DEGRADED_HEADER, HeaderValue::from_static("true"));
    }
    Ok(response)
}

fn header_safe(file_name: &str) -> String {
    file_name
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
