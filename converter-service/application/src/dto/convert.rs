use serde::{Deserialize, Serialize};
use validator::Validate;

use converter_domain::{
    BitDepth, ChannelLayout, ConversionSettings, DomainError, FileId, SampleRate, SourceAudio,
    TrimRange,
};

/// A file part received from a multipart form.
#[derive(Debug, Clone, Serialize, Validate)]
pub struct UploadedFile {
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,
    pub content_type: Option<String>,
    #[validate(length(min = 1, message = "uploaded file is empty"))]
    pub bytes: Vec<u8>,
}

impl From<UploadedFile> for SourceAudio {
    fn from(file: UploadedFile) -> Self {
        SourceAudio {
            file_name: file.file_name,
            content_type: file.content_type,
            bytes: file.bytes,
        }
    }
}

/// User-facing conversion settings; anything left out falls back to the
/// configured defaults.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConversionOptions {
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub bit_depth: Option<u16>,
    #[validate(range(max = 200))]
    pub volume: Option<u16>,
    #[validate(range(min = 0.0))]
    pub trim_start: Option<f64>,
    #[validate(range(min = 0.0))]
    pub trim_end: Option<f64>,
}

impl ConversionOptions {
    pub fn resolve(&self, defaults: &ConversionSettings) -> Result<ConversionSettings, DomainError> {
        let settings = ConversionSettings {
            volume_percent: self.volume.unwrap_or(defaults.volume_percent),
            sample_rate: self
                .sample_rate
                .map(SampleRate::try_from)
                .transpose()?
                .unwrap_or(defaults.sample_rate),
            channels: self
                .channels
                .map(ChannelLayout::try_from)
                .transpose()?
                .unwrap_or(defaults.channels),
            bit_depth: self
                .bit_depth
                .map(BitDepth::try_from)
                .transpose()?
                .unwrap_or(defaults.bit_depth),
            trim: self.trim()?.or(defaults.trim),
        };
        settings.validate()?;
        Ok(settings)
    }

    fn trim(&self) -> Result<Option<TrimRange>, DomainError> {
        match (self.trim_start, self.trim_end) {
            (None, None) => Ok(None),
            (Some(start), None) if start == 0.0 => Ok(None),
            (Some(_), None) => Err(DomainError::invalid_trim(
                "trimEnd is required when trimStart is set",
            )),
            (start, Some(end)) => TrimRange::new(start.unwrap_or(0.0), end).map(Some),
        }
    }
}

#[derive(Debug, Clone, Validate)]
pub struct ConvertAudioRequest {
    #[validate(nested)]
    pub file: UploadedFile,
    #[validate(nested)]
    pub options: ConversionOptions,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertAudioResponse {
    pub file_id: FileId,
    pub original_name: String,
    pub ffmpeg_available: bool,
    pub r2_success: bool,
    pub size: u64,
    pub degraded: bool,
    pub engine: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Validate)]
pub struct BatchConvertRequest {
    #[validate(length(min = 1, message = "at least one file is required"))]
    pub files: Vec<UploadedFile>,
    #[validate(nested)]
    pub options: ConversionOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchConvertResponse {
    pub results: Vec<BatchItemResult>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemResult {
    pub index: usize,
    pub original_name: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ConvertAudioResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BatchItemError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItemError {
    pub error: String,
    pub detail: String,
}

#[derive(Debug, Clone)]
pub struct DownloadConversionRequest {
    pub file_id: String,
    /// Regenerate placeholder audio when the file is gone.
    pub rebuild: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionCheckResponse {
    pub file_id: FileId,
    pub exists: bool,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_depth: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ConversionDownload {
    pub file_id: FileId,
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub degraded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_options_fall_back_to_defaults() {
        let settings = ConversionOptions::default()
            .resolve(&ConversionSettings::default())
            .unwrap();
        assert_eq!(settings, ConversionSettings::default());
    }

    #[test]
    fn explicit_options_are_parsed() {
        let options = ConversionOptions {
            sample_rate: Some(22_050),
            channels: Some(1),
            bit_depth: Some(24),
            volume: Some(150),
            trim_start: None,
            trim_end: Some(2.5),
        };
        let settings = options.resolve(&ConversionSettings::default()).unwrap();
        assert_eq!(settings.sample_rate, SampleRate::Hz22050);
        assert_eq!(settings.channels, ChannelLayout::Mono);
        assert_eq!(settings.bit_depth, BitDepth::TwentyFour);
        assert_eq!(settings.volume_percent, 150);
        let trim = settings.trim.unwrap();
        assert_eq!((trim.start_seconds(), trim.end_seconds()), (0.0, 2.5));
    }

    #[test]
    fn unsupported_values_are_rejected() {
        let defaults = ConversionSettings::default();
        let bad_rate = ConversionOptions {
            sample_rate: Some(16_000),
            ..Default::default()
        };
        assert!(matches!(
            bad_rate.resolve(&defaults),
            Err(DomainError::InvalidSettings(_))
        ));

        let open_trim = ConversionOptions {
            trim_start: Some(1.0),
            ..Default::default()
        };
        assert!(matches!(
            open_trim.resolve(&defaults),
            Err(DomainError::InvalidTrimRange(_))
        ));

        let loud = ConversionOptions {
            volume: Some(250),
            ..Default::default()
        };
        assert!(loud.validate().is_err());
    }
}
