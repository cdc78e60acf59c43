use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::Validate;

use converter_domain::{FileId, ShareId};

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateShareRequest {
    #[validate(length(min = 1, max = 64))]
    pub file_id: String,
    #[validate(length(min = 1, max = 255))]
    pub original_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShareResponse {
    pub share_id: ShareId,
    pub share_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareDetailsResponse {
    pub share_id: ShareId,
    pub file_id: FileId,
    pub original_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub download_url: String,
}

#[derive(Debug, Clone)]
pub struct SharedDownload {
    pub share_id: ShareId,
    pub file_name: String,
    pub bytes: Vec<u8>,
}
