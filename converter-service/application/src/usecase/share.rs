use std::sync::Arc;

use async_trait::async_trait;
use time::Duration;
use validator::Validate;

use converter_domain::{
    Clock, DomainError, FileId, FileStorePort, ShareId, ShareRecord, ShareStorePort,
};

use crate::{
    ApplicationError, CreateShareRequest, CreateShareResponse, ShareDetailsResponse,
    SharedDownload,
};

#[async_trait]
pub trait ShareUseCase: Send + Sync {
    async fn create_share(
        &self,
        request: CreateShareRequest,
    ) -> Result<CreateShareResponse, ApplicationError>;

    async fn get_share(&self, share_id: &str) -> Result<ShareDetailsResponse, ApplicationError>;

    async fn download_share(&self, share_id: &str) -> Result<SharedDownload, ApplicationError>;
}

pub struct ShareUseCaseImpl {
    share_store: Arc<dyn ShareStorePort>,
    file_store: Arc<dyn FileStorePort>,
    clock: Arc<dyn Clock>,
    expiry: Duration,
    public_base_url: String,
}

impl ShareUseCaseImpl {
    pub fn new(
        share_store: Arc<dyn ShareStorePort>,
        file_store: Arc<dyn FileStorePort>,
        clock: Arc<dyn Clock>,
        expiry: Duration,
        public_base_url: impl Into<String>,
    ) -> Self {
        let public_base_url: String = public_base_url.into();
        Self {
            share_store,
            file_store,
            clock,
            expiry,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Looks up a share, dropping it on the way out when it has expired.
    async fn active_record(&self, share_id: &str) -> Result<ShareRecord, ApplicationError> {
        let share_id: ShareId = share_id.parse()?;
        let record = self
            .share_store
            .get(&share_id)
            .await?
            .ok_or_else(|| DomainError::ShareNotFound(share_id.to_string()))?;

        if record.is_expired(self.clock.now()) {
            if let Err(err) = self.share_store.remove(&share_id).await {
                tracing::warn!(share_id = %share_id, error = %err, "failed to drop expired share");
            }
            return Err(DomainError::ShareExpired(share_id.to_string()).into());
        }
        Ok(record)
    }
}

#[async_trait]
impl ShareUseCase for ShareUseCaseImpl {
    async fn create_share(
        &self,
        request: CreateShareRequest,
    ) -> Result<CreateShareResponse, ApplicationError> {
        request.validate()?;
        let file_id: FileId = request.file_id.parse()?;
        if self.file_store.stat(&file_id).await?.is_none() {
            return Err(DomainError::FileNotFound(file_id.to_string()).into());
        }

        let created_at = self.clock.now();
        let record = ShareRecord {
            share_id: ShareId::generate(),
            file_id,
            original_name: request
                .original_name
                .unwrap_or_else(|| format!("{file_id}.wav")),
            created_at,
            expires_at: created_at + self.expiry,
        };
        self.share_store.put(&record).await?;

        tracing::info!(
            share_id = %record.share_id,
            file_id = %record.file_id,
            expires_at = %record.expires_at,
            "share link created"
        );

        Ok(CreateShareResponse {
            share_url: format!("{}/share/{}", self.public_base_url, record.share_id),
            share_id: record.share_id,
            expires_at: record.expires_at,
        })
    }

    async fn get_share(&self, share_id: &str) -> Result<ShareDetailsResponse, ApplicationError> {
        let record = self.active_record(share_id).await?;
        Ok(ShareDetailsResponse {
            download_url: format!(
                "{}/api/share/{}/download",
                self.public_base_url, record.share_id
            ),
            share_id: record.share_id,
            file_id: record.file_id,
            original_name: record.original_name,
            created_at: record.created_at,
            expires_at: record.expires_at,
        })
    }

    async fn download_share(&self, share_id: &str) -> Result<SharedDownload, ApplicationError> {
        let record = self.active_record(share_id).await?;
        let bytes = self
            .file_store
            .load(&record.file_id)
            .await?
            .ok_or_else(|| DomainError::FileNotFound(record.file_id.to_string()))?;

        tracing::debug!(share_id = %record.share_id, size = bytes.len(), "serving shared file");
        Ok(SharedDownload {
            share_id: record.share_id,
            file_name: wav_file_name(&record.original_name, &record.file_id),
            bytes,
        })
    }
}

/// `song.mp3` -> `song.wav`; falls back to the file id when nothing usable is left.
fn wav_file_name(original_name: &str, file_id: &FileId) -> String {
    let base = original_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    };
    let stem: String = stem
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .collect();

    if stem.trim().is_empty() {
        format!("{file_id}.wav")
    } else {
        format!("{}.wav", stem.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_file_names_end_in_wav() {
        let file_id = FileId::generate();
        assert_eq!(wav_file_name("song.mp3", &file_id), "song.wav");
        assert_eq!(wav_file_name("my.mix.v2.mp3", &file_id), "my.mix.v2.wav");
        assert_eq!(wav_file_name("../../etc/passwd", &file_id), "passwd.wav");
        assert_eq!(wav_file_name("noext", &file_id), "noext.wav");
        assert_eq!(wav_file_name("\"\".mp3", &file_id), format!("{file_id}.wav"));
    }
}
