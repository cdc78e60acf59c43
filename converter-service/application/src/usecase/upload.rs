use std::sync::Arc;

use async_trait::async_trait;
use validator::Validate;

use converter_domain::{DomainError, FileId, ObjectStoragePort};

use crate::{ApplicationError, ProxyUploadRequest, ProxyUploadResponse};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[async_trait]
pub trait ProxyUploadUseCase: Send + Sync {
    async fn upload(
        &self,
        request: ProxyUploadRequest,
    ) -> Result<ProxyUploadResponse, ApplicationError>;
}

pub struct ProxyUploadUseCaseImpl {
    object_storage: Option<Arc<dyn ObjectStoragePort>>,
    max_upload_bytes: u64,
}

impl ProxyUploadUseCaseImpl {
    /// `object_storage` is `None` when no bucket is configured.
    pub fn new(object_storage: Option<Arc<dyn ObjectStoragePort>>, max_upload_bytes: u64) -> Self {
        Self {
            object_storage,
            max_upload_bytes,
        }
    }
}

#[async_trait]
impl ProxyUploadUseCase for ProxyUploadUseCaseImpl {
    async fn upload(
        &self,
        request: ProxyUploadRequest,
    ) -> Result<ProxyUploadResponse, ApplicationError> {
        let object_storage = self.object_storage.as_ref().ok_or_else(|| {
            DomainError::external_service_error("object-storage", "object storage is not configured")
        })?;

        request.validate()?;
        let ProxyUploadRequest { file, key } = request;
        let size = file.bytes.len() as u64;
        if size > self.max_upload_bytes {
            return Err(DomainError::FileTooLarge {
                size,
                limit: self.max_upload_bytes,
            }
            .into());
        }

        let key = match key {
            Some(key) => checked_key(key)?,
            None => format!(
                "uploads/{}/{}",
                FileId::generate(),
                sanitize_segment(&file.file_name)
            ),
        };
        let content_type = file
            .content_type
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        tracing::info!(key = %key, size, "proxying upload to object storage");
        let stored = object_storage
            .put_object(&key, file.bytes, &content_type)
            .await?;

        Ok(ProxyUploadResponse {
            success: true,
            key: stored.key,
            url: stored.url,
            size: stored.size,
            attempts: stored.attempts,
        })
    }
}

/// Keys are relative `/`-separated paths of `[A-Za-z0-9._-]` segments.
fn checked_key(key: String) -> Result<String, DomainError> {
    let valid = !key.starts_with('/')
        && key.split('/').all(|segment| {
            !segment.is_empty()
                && segment != "."
                && segment != ".."
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        });

    if valid {
        Ok(key)
    } else {
        Err(DomainError::InvalidIdentifier(format!(
            "`{key}` is not a valid object key"
        )))
    }
}

fn sanitize_segment(file_name: &str) -> String {
    let cleaned: String = file_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    match cleaned.trim_matches('.') {
        "" => "upload.bin".to_string(),
        name => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_keys_must_be_relative_and_plain() {
        assert!(checked_key("conversions/abc.wav".to_string()).is_ok());
        assert!(checked_key("a/b-c_d.e".to_string()).is_ok());
        for bad in ["/abs.wav", "a/../b.wav", "a//b", "space here.wav", "a/./b", ""] {
            assert!(checked_key(bad.to_string()).is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn generated_key_segment_is_sanitized() {
        assert_eq!(sanitize_segment("my song (1).wav"), "my_song__1_.wav");
        assert_eq!(sanitize_segment("C:\\music\\take.wav"), "take.wav");
        assert_eq!(sanitize_segment(".."), "upload.bin");
    }
}
