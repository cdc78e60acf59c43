use std::sync::Arc;

use async_trait::async_trait;

use converter_domain::{DomainError, FileId, FileStorePort, PlaceholderGeneratorPort};

use crate::{
    usecase::placeholder::render_placeholder, ApplicationError, ConversionCheckResponse,
    ConversionDownload, ConversionPolicy, DownloadConversionRequest,
};

#[async_trait]
pub trait RetrieveConversionUseCase: Send + Sync {
    async fn check(&self, file_id: &str) -> Result<ConversionCheckResponse, ApplicationError>;

    async fn download(
        &self,
        request: DownloadConversionRequest,
    ) -> Result<ConversionDownload, ApplicationError>;
}

pub struct RetrieveConversionUseCaseImpl {
    file_store: Arc<dyn FileStorePort>,
    placeholders: Vec<Arc<dyn PlaceholderGeneratorPort>>,
    policy: ConversionPolicy,
}

impl RetrieveConversionUseCaseImpl {
    pub fn new(
        file_store: Arc<dyn FileStorePort>,
        placeholders: Vec<Arc<dyn PlaceholderGeneratorPort>>,
        policy: ConversionPolicy,
    ) -> Self {
        Self {
            file_store,
            placeholders,
            policy,
        }
    }

    async fn rebuild(&self, file_id: FileId) -> Result<ConversionDownload, ApplicationError> {
        let outcome = render_placeholder(
            &self.placeholders,
            &self.policy.defaults,
            self.policy.placeholder_seconds,
        )?;
        let bytes = outcome.container.into_bytes();
        self.file_store.save(&file_id, &bytes).await?;
        tracing::warn!(file_id = %file_id, engine = %outcome.engine, "rebuilt missing file as placeholder");

        Ok(ConversionDownload {
            file_id,
            file_name: format!("{file_id}.wav"),
            bytes,
            degraded: true,
        })
    }
}

#[async_trait]
impl RetrieveConversionUseCase for RetrieveConversionUseCaseImpl {
    async fn check(&self, file_id: &str) -> Result<ConversionCheckResponse, ApplicationError> {
        let file_id: FileId = file_id.parse()?;
        let Some(stored) = self.file_store.stat(&file_id).await? else {
            return Ok(ConversionCheckResponse {
                file_id,
                exists: false,
                size: 0,
                sample_rate: None,
                channels: None,
                bit_depth: None,
                duration_seconds: None,
            });
        };

        let header = stored.header;
        Ok(ConversionCheckResponse {
            file_id,
            exists: true,
            size: stored.size,
            sample_rate: header.map(|header| header.format.sample_rate_hz),
            channels: header.map(|header| header.format.channels),
            bit_depth: header.map(|header| header.format.bit_depth.bits()),
            duration_seconds: header.map(|header| header.duration_seconds()),
        })
    }

    async fn download(
        &self,
        request: DownloadConversionRequest,
    ) -> Result<ConversionDownload, ApplicationError> {
        let file_id: FileId = request.file_id.parse()?;
        tracing::debug!(file_id = %file_id, rebuild = request.rebuild, "serving converted file");

        match self.file_store.load(&file_id).await? {
            Some(bytes) => Ok(ConversionDownload {
                file_id,
                file_name: format!("{file_id}.wav"),
                bytes,
                degraded: false,
            }),
            None if request.rebuild && self.policy.allow_degraded => self.rebuild(file_id).await,
            None => Err(DomainError::FileNotFound(file_id.to_string()).into()),
        }
    }
}
