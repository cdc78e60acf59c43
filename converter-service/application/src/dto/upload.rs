use serde::Serialize;
use validator::Validate;

use crate::UploadedFile;

#[derive(Debug, Clone, Validate)]
pub struct ProxyUploadRequest {
    #[validate(nested)]
    pub file: UploadedFile,
    /// Object key; generated from the file name when absent.
    #[validate(length(min = 1, max = 512))]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProxyUploadResponse {
    pub success: bool,
    pub key: String,
    pub url: String,
    pub size: u64,
    pub attempts: u32,
}
