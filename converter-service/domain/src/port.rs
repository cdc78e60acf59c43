use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    AudioTransformRequest, AudioTransformResult, ConversionSettings, DomainError, FileId,
    ShareId, ShareRecord, SourceAudio, StoredFile, StoredObject, WavContainer,
};

#[async_trait]
pub trait AudioTransformPort: Send + Sync {
    async fn transform(
        &self,
        request: AudioTransformRequest,
    ) -> Result<AudioTransformResult, DomainError>;
}

/// One step of the server conversion chain (FFmpeg, native decoder, ...).
#[async_trait]
pub trait ConversionEnginePort: Send + Sync {
    fn name(&self) -> &str;

    async fn convert(
        &self,
        source: &SourceAudio,
        settings: &ConversionSettings,
    ) -> Result<WavContainer, DomainError>;
}

/// Synthetic audio used when no engine could convert the upload.
pub trait PlaceholderGeneratorPort: Send + Sync {
    fn name(&self) -> &'static str;

    fn generate(
        &self,
        settings: &ConversionSettings,
        duration_seconds: f32,
    ) -> Result<WavContainer, DomainError>;
}

#[async_trait]
pub trait FileStorePort: Send + Sync {
    async fn save(&self, file_id: &FileId, bytes: &[u8]) -> Result<StoredFile, DomainError>;

    async fn load(&self, file_id: &FileId) -> Result<Option<Vec<u8>>, DomainError>;

    async fn stat(&self, file_id: &FileId) -> Result<Option<StoredFile>, DomainError>;

    /// Removes files last written before `cutoff`; returns how many were removed.
    async fn purge_older_than(&self, cutoff: OffsetDateTime) -> Result<usize, DomainError>;
}

#[async_trait]
pub trait ShareStorePort: Send + Sync {
    async fn put(&self, record: &ShareRecord) -> Result<(), DomainError>;

    async fn get(&self, share_id: &ShareId) -> Result<Option<ShareRecord>, DomainError>;

    async fn remove(&self, share_id: &ShareId) -> Result<bool, DomainError>;

    async fn purge_expired(&self, now: OffsetDateTime) -> Result<usize, DomainError>;
}

#[async_trait]
pub trait ObjectStoragePort: Send + Sync {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject, DomainError>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}
