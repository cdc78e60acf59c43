use std::str::FromStr;

use axum::extract::{
    multipart::{Field, MultipartError, MultipartRejection},
    Multipart,
};
use axum::http::StatusCode;

use converter_application::{ConversionOptions, UploadedFile};

use crate::error::HttpError;

/// Fields shared by every multipart endpoint.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub files: Vec<UploadedFile>,
    pub options: ConversionOptions,
    pub key: Option<String>,
}

impl UploadForm {
    pub fn single_file(mut self) -> Result<(UploadedFile, ConversionOptions, Option<String>), HttpError> {
        if self.files.is_empty() {
            return Err(HttpError::bad_request("a `file` field is required"));
        }
        if self.files.len() > 1 {
            tracing::debug!(
                file_count = self.files.len(),
                "extra file fields ignored on single-file endpoint"
            );
        }
        let file = self.files.swap_remove(0);
        Ok((file, self.options, self.key))
    }
}

pub async fn read_form(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<UploadForm, HttpError> {
    let mut multipart =
        multipart.map_err(|rejection| HttpError::bad_request(rejection.body_text()))?;
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => form.files.push(read_file(field).await?),
            "sampleRate" => form.options.sample_rate = number(&name, field, "InvalidSettings").await?,
            "channels" => form.options.channels = number(&name, field, "InvalidSettings").await?,
            "bitDepth" => form.options.bit_depth = number(&name, field, "InvalidSettings").await?,
            "volume" => form.options.volume = number(&name, field, "InvalidSettings").await?,
            "trimStart" => form.options.trim_start = number(&name, field, "InvalidTrimRange").await?,
            "trimEnd" => form.options.trim_end = number(&name, field, "InvalidTrimRange").await?,
            "key" => {
                let text = field.text().await.map_err(multipart_error)?;
                let text = text.trim();
                form.key = (!text.is_empty()).then(|| text.to_string());
            }
            _ => tracing::debug!(field = %name, "ignoring unknown form field"),
        }
    }

    Ok(form)
}

async fn read_file(field: Field<'_>) -> Result<UploadedFile, HttpError> {
    let file_name = field
        .file_name()
        .filter(|name| !name.is_empty())
        .unwrap_or("upload")
        .to_string();
    let content_type = field.content_type().map(str::to_string);
    let bytes = field.bytes().await.map_err(multipart_error)?;

    Ok(UploadedFile {
        file_name,
        content_type,
        bytes: bytes.to_vec(),
    })
}

/// Blank text fields count as absent.
async fn number<T: FromStr>(
    name: &str,
    field: Field<'_>,
    error_code: &str,
) -> Result<Option<T>, HttpError> {
    let text = field.text().await.map_err(multipart_error)?;
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<T>().map(Some).map_err(|_| HttpError::BadRequest {
        error: error_code.to_string(),
        detail: format!("`{name}` must be a number, got `{text}`"),
    })
}

fn multipart_error(error: MultipartError) -> HttpError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        HttpError::PayloadTooLarge {
            error: "FileTooLarge".to_string(),
            detail: error.body_text(),
        }
    } else {
        HttpError::bad_request(error.body_text())
    }
}
