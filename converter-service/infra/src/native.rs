use std::sync::Arc;

use async_trait::async_trait;
use converter_domain::{
    AudioTransformPort, AudioTransformRequest, ConversionEnginePort, ConversionSettings,
    DomainError, SampleRateMode, SourceAudio, WavContainer, WavFormat,
};

use crate::{encode_wav, Mp3Decoder};

/// Decode, transform and encode in-process. Decoding and encoding run on the
/// blocking pool.
pub struct NativeConversionEngine {
    decoder: Mp3Decoder,
    transformer: Arc<dyn AudioTransformPort>,
    mode: SampleRateMode,
}

impl NativeConversionEngine {
    pub fn new(transformer: Arc<dyn AudioTransformPort>, mode: SampleRateMode) -> Self {
        Self {
            decoder: Mp3Decoder::new(),
            transformer,
            mode,
        }
    }
}

#[async_trait]
impl ConversionEnginePort for NativeConversionEngine {
    fn name(&self) -> &str {
        "native"
    }

    async fn convert(
        &self,
        source: &SourceAudio,
        settings: &ConversionSettings,
    ) -> Result<WavContainer, DomainError> {
        let decoder = self.decoder;
        let bytes = source.bytes.clone();
        let extension = source.extension();
        let decoded =
            tokio::task::spawn_blocking(move || decoder.decode(&bytes, extension.as_deref()))
                .await
                .map_err(|err| DomainError::internal_error(&format!("decode task failed: {err}")))??;

        tracing::debug!(
            file_name = %source.file_name,
            duration_seconds = decoded.duration_seconds(),
            "native engine decoded upload"
        );

        let transformed = self
            .transformer
            .transform(AudioTransformRequest {
                source: decoded,
                settings: *settings,
                mode: self.mode,
            })
            .await?;

        let format = WavFormat {
            sample_rate_hz: transformed.buffer.sample_rate_hz,
            channels: transformed.buffer.channels,
            bit_depth: settings.bit_depth,
        };
        tokio::task::spawn_blocking(move || encode_wav(&transformed.buffer.samples, format))
            .await
            .map_err(|err| DomainError::internal_error(&format!("encode task failed: {err}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AudioTransformerAdapter;

    #[tokio::test]
    async fn undecodable_upload_is_reported_not_masked() {
        let engine = NativeConversionEngine::new(
            Arc::new(AudioTransformerAdapter::new()),
            SampleRateMode::Resample,
        );
        let source = SourceAudio {
            file_name: "broken.mp3".to_string(),
            content_type: Some("audio/mpeg".to_string()),
            bytes: vec![0x49, 0x44, 0x33, 0x00, 0x01],
        };

        let error = engine
            .convert(&source, &ConversionSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(error, DomainError::DecodeFailure(_)));
    }
}
