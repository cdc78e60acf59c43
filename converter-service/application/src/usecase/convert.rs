use std::sync::Arc;

use async_trait::async_trait;
use validator::Validate;

use converter_domain::{
    ConversionEnginePort, ConversionOutcome, ConversionSettings, DomainError, FileId,
    FileStorePort, ObjectStoragePort, PlaceholderGeneratorPort, SourceAudio, WavContainer,
    MAX_PLACEHOLDER_SECONDS,
};

use crate::{
    usecase::placeholder::render_placeholder, ApplicationError, BatchConvertRequest,
    BatchConvertResponse, BatchItemError, BatchItemResult, ConversionOptions,
    ConvertAudioRequest, ConvertAudioResponse, UploadedFile,
};

const MP3_CONTENT_TYPES: [&str; 2] = ["audio/mpeg", "audio/mp3"];

#[async_trait]
pub trait ConvertAudioUseCase: Send + Sync {
    async fn convert(
        &self,
        request: ConvertAudioRequest,
    ) -> Result<ConvertAudioResponse, ApplicationError>;

    async fn convert_batch(
        &self,
        request: BatchConvertRequest,
    ) -> Result<BatchConvertResponse, ApplicationError>;
}

#[derive(Debug, Clone)]
pub struct ConversionPolicy {
    pub max_upload_bytes: u64,
    pub defaults: ConversionSettings,
    /// Serve synthetic audio instead of failing when every engine fails.
    pub allow_degraded: bool,
    pub placeholder_seconds: f32,
}

impl Default for ConversionPolicy {
    fn default() -> Self {
        Self {
            max_upload_bytes: 50 * 1024 * 1024,
            defaults: ConversionSettings::default(),
            allow_degraded: true,
            placeholder_seconds: 5.0,
        }
    }
}

pub struct ConvertAudioUseCaseImpl {
    engines: Vec<Arc<dyn ConversionEnginePort>>,
    placeholders: Vec<Arc<dyn PlaceholderGeneratorPort>>,
    file_store: Arc<dyn FileStorePort>,
    object_storage: Option<Arc<dyn ObjectStoragePort>>,
    ffmpeg_available: bool,
    policy: ConversionPolicy,
}

impl ConvertAudioUseCaseImpl {
    pub fn new(
        engines: Vec<Arc<dyn ConversionEnginePort>>,
        placeholders: Vec<Arc<dyn PlaceholderGeneratorPort>>,
        file_store: Arc<dyn FileStorePort>,
        policy: ConversionPolicy,
    ) -> Self {
        Self {
            engines,
            placeholders,
            file_store,
            object_storage: None,
            ffmpeg_available: false,
            policy,
        }
    }

    /// Converted files are also copied to `conversions/<fileId>.wav` in the bucket.
    pub fn with_object_storage(mut self, object_storage: Arc<dyn ObjectStoragePort>) -> Self {
        self.object_storage = Some(object_storage);
        self
    }

    pub fn with_ffmpeg_available(mut self, ffmpeg_available: bool) -> Self {
        self.ffmpeg_available = ffmpeg_available;
        self
    }

    fn check_source(&self, source: &SourceAudio) -> Result<(), DomainError> {
        let has_mp3_extension = source.extension().as_deref() == Some("mp3");
        let has_mp3_content_type = source.content_type.as_deref().is_some_and(|content_type| {
            let essence = content_type
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            MP3_CONTENT_TYPES.contains(&essence.as_str())
        });
        if !has_mp3_extension && !has_mp3_content_type {
            return Err(DomainError::InvalidFileType(format!(
                "`{}` is not an MP3 file",
                source.file_name
            )));
        }

        if source.size() > self.policy.max_upload_bytes {
            return Err(DomainError::FileTooLarge {
                size: source.size(),
                limit: self.policy.max_upload_bytes,
            });
        }
        Ok(())
    }

    async fn run_engines(
        &self,
        source: &SourceAudio,
        settings: &ConversionSettings,
    ) -> Result<ConversionOutcome, DomainError> {
        let mut last_error = None;
        for engine in &self.engines {
            match engine.convert(source, settings).await {
                Ok(container) => {
                    return Ok(ConversionOutcome {
                        container,
                        engine: engine.name().to_string(),
                        degraded: false,
                    })
                }
                // The request itself is wrong; another engine will not fix it.
                Err(err @ (DomainError::InvalidTrimRange(_) | DomainError::InvalidSettings(_))) => {
                    return Err(err)
                }
                Err(err) => {
                    tracing::warn!(engine = engine.name(), error = %err, "conversion engine failed");
                    last_error = Some(err);
                }
            }
        }

        let reason = match last_error {
            Some(err) => err.to_string(),
            None => "no conversion engine is configured".to_string(),
        };
        if !self.policy.allow_degraded {
            return Err(DomainError::ConversionFailed(reason));
        }

        tracing::warn!(reason = %reason, "every conversion engine failed, degrading to placeholder");
        let duration_seconds = settings
            .trim
            .map(|trim| trim.length_seconds() as f32)
            .unwrap_or(self.policy.placeholder_seconds)
            .min(MAX_PLACEHOLDER_SECONDS);
        render_placeholder(&self.placeholders, settings, duration_seconds)
    }

    async fn upload_copy(
        &self,
        file_id: &FileId,
        container: &WavContainer,
        file_index: usize,
        file_count: usize,
    ) -> bool {
        let Some(object_storage) = &self.object_storage else {
            return false;
        };

        let key = format!("conversions/{file_id}.wav");
        match object_storage
            .put_object(&key, container.bytes().to_vec(), "audio/wav")
            .await
        {
            Ok(stored) => {
                tracing::info!(
                    file_index,
                    file_count,
                    file_id = %file_id,
                    key = %stored.key,
                    attempts = stored.attempts,
                    "uploaded converted file"
                );
                true
            }
            Err(err) => {
                tracing::warn!(file_id = %file_id, error = %err, "object storage copy failed");
                false
            }
        }
    }

    async fn convert_one(
        &self,
        file: UploadedFile,
        options: &ConversionOptions,
        file_index: usize,
        file_count: usize,
    ) -> Result<ConvertAudioResponse, ApplicationError> {
        file.validate()?;
        let source = SourceAudio::from(file);
        self.check_source(&source)?;
        let settings = options.resolve(&self.policy.defaults)?;

        tracing::info!(
            file_index,
            file_count,
            original_name = %source.file_name,
            size = source.size(),
            "received upload"
        );

        let outcome = self.run_engines(&source, &settings).await?;
        tracing::info!(
            file_index,
            file_count,
            engine = %outcome.engine,
            degraded = outcome.degraded,
            size = outcome.container.len(),
            "converted upload"
        );

        let file_id = FileId::generate();
        let stored = self
            .file_store
            .save(&file_id, outcome.container.bytes())
            .await?;
        tracing::info!(file_index, file_count, file_id = %file_id, size = stored.size, "stored converted file");

        let r2_success = self
            .upload_copy(&file_id, &outcome.container, file_index, file_count)
            .await;

        let format = outcome.container.format();
        Ok(ConvertAudioResponse {
            file_id,
            original_name: source.file_name,
            ffmpeg_available: self.ffmpeg_available,
            r2_success,
            size: stored.size,
            degraded: outcome.degraded,
            engine: outcome.engine,
            sample_rate: format.sample_rate_hz,
            channels: format.channels,
            bit_depth: format.bit_depth.bits(),
            duration_seconds: outcome.container.duration_seconds(),
        })
    }
}

#[async_trait]
impl ConvertAudioUseCase for ConvertAudioUseCaseImpl {
    async fn convert(
        &self,
        request: ConvertAudioRequest,
    ) -> Result<ConvertAudioResponse, ApplicationError> {
        request.options.validate()?;
        self.convert_one(request.file, &request.options, 0, 1).await
    }

    async fn convert_batch(
        &self,
        request: BatchConvertRequest,
    ) -> Result<BatchConvertResponse, ApplicationError> {
        request.validate()?;
        let BatchConvertRequest { files, options } = request;
        let file_count = files.len();

        let mut results = Vec::with_capacity(file_count);
        for (index, file) in files.into_iter().enumerate() {
            let original_name = file.file_name.clone();
            let item = match self.convert_one(file, &options, index, file_count).await {
                Ok(response) => BatchItemResult {
                    index,
                    original_name,
                    ok: true,
                    result: Some(response),
                    error: None,
                },
                Err(err) => {
                    tracing::warn!(file_index = index, file_count, error = %err, "batch item failed");
                    BatchItemResult {
                        index,
                        original_name,
                        ok: false,
                        result: None,
                        error: Some(BatchItemError {
                            error: err.code().to_string(),
                            detail: err.to_string(),
                        }),
                    }
                }
            };
            results.push(item);
        }

        Ok(BatchConvertResponse { results })
    }
}
