use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::DomainError;

/// Size of the canonical RIFF/WAVE header written by the encoder.
pub const WAV_HEADER_LEN: usize = 44;

pub const MAX_VOLUME_PERCENT: u16 = 200;

/// Longest synthetic placeholder a generator will render.
pub const MAX_PLACEHOLDER_SECONDS: f32 = 600.0;

/// Interleaved float samples, nominally in [-1.0, 1.0].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSampleBuffer {
    pub samples: Vec<f32>,
    pub sample_rate_hz: u32,
    pub channels: u16,
}

impl AudioSampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate_hz: u32, channels: u16) -> Result<Self, DomainError> {
        if sample_rate_hz == 0 {
            return Err(DomainError::invalid_settings(
                "sample rate must be greater than zero",
            ));
        }
        if channels == 0 {
            return Err(DomainError::invalid_settings(
                "channel count must be greater than zero",
            ));
        }
        if samples.len() % channels as usize != 0 {
            return Err(DomainError::invalid_settings(format!(
                "sample count {} is not a multiple of channel count {channels}",
                samples.len()
            )));
        }

        Ok(Self {
            samples,
            sample_rate_hz,
            channels,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate_hz == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / f64::from(self.sample_rate_hz)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum SampleRate {
    Hz22050,
    Hz32000,
    Hz44100,
    Hz48000,
}

impl SampleRate {
    pub const ALL: [SampleRate; 4] = [
        SampleRate::Hz22050,
        SampleRate::Hz32000,
        SampleRate::Hz44100,
        SampleRate::Hz48000,
    ];

    pub fn hz(self) -> u32 {
        match self {
            SampleRate::Hz22050 => 22_050,
            SampleRate::Hz32000 => 32_000,
            SampleRate::Hz44100 => 44_100,
            SampleRate::Hz48000 => 48_000,
        }
    }
}

impl TryFrom<u32> for SampleRate {
    type Error = DomainError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        SampleRate::ALL
            .into_iter()
            .find(|rate| rate.hz() == value)
            .ok_or_else(|| {
                DomainError::invalid_settings(format!(
                    "sample rate {value} is not one of 22050, 32000, 44100, 48000"
                ))
            })
    }
}

impl From<SampleRate> for u32 {
    fn from(value: SampleRate) -> Self {
        value.hz()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum ChannelLayout {
    Mono,
    Stereo,
}

impl ChannelLayout {
    pub fn count(self) -> u16 {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }
}

impl TryFrom<u16> for ChannelLayout {
    type Error = DomainError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ChannelLayout::Mono),
            2 => Ok(ChannelLayout::Stereo),
            other => Err(DomainError::invalid_settings(format!(
                "channel count {other} is not supported (expected 1 or 2)"
            ))),
        }
    }
}

impl From<ChannelLayout> for u16 {
    fn from(value: ChannelLayout) -> Self {
        value.count()
    }
}

/// Output sample encoding. 32-bit means IEEE-754 float samples, not int32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum BitDepth {
    Sixteen,
    TwentyFour,
    ThirtyTwoFloat,
}

impl BitDepth {
    pub fn bits(self) -> u16 {
        match self {
            BitDepth::Sixteen => 16,
            BitDepth::TwentyFour => 24,
            BitDepth::ThirtyTwoFloat => 32,
        }
    }

    pub fn bytes(self) -> usize {
        usize::from(self.bits() / 8)
    }
}

impl TryFrom<u16> for BitDepth {
    type Error = DomainError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            16 => Ok(BitDepth::Sixteen),
            24 => Ok(BitDepth::TwentyFour),
            32 => Ok(BitDepth::ThirtyTwoFloat),
            other => Err(DomainError::invalid_settings(format!(
                "bit depth {other} is not supported (expected 16, 24 or 32)"
            ))),
        }
    }
}

impl From<BitDepth> for u16 {
    fn from(value: BitDepth) -> Self {
        value.bits()
    }
}

/// Retained time window, in seconds. `start < end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimRange {
    start_seconds: f64,
    end_seconds: f64,
}

impl TrimRange {
    pub fn new(start_seconds: f64, end_seconds: f64) -> Result<Self, DomainError> {
        if !start_seconds.is_finite() || !end_seconds.is_finite() {
            return Err(DomainError::invalid_trim("trim bounds must be finite"));
        }
        if start_seconds < 0.0 {
            return Err(DomainError::invalid_trim(format!(
                "trim start {start_seconds}s is negative"
            )));
        }
        if end_seconds <= start_seconds {
            return Err(DomainError::invalid_trim(format!(
                "trim end {end_seconds}s must be after trim start {start_seconds}s"
            )));
        }

        Ok(Self {
            start_seconds,
            end_seconds,
        })
    }

    pub fn start_seconds(&self) -> f64 {
        self.start_seconds
    }

    pub fn end_seconds(&self) -> f64 {
        self.end_seconds
    }

    pub fn length_seconds(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }
}

/// How a target sample rate that differs from the source is honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleRateMode {
    /// Linear interpolation to the target rate.
    #[default]
    Resample,
    /// Keep samples untouched and only declare the target rate in the header.
    /// Changes perceived pitch and speed.
    Relabel,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConversionSettings {
    pub volume_percent: u16,
    pub sample_rate: SampleRate,
    pub channels: ChannelLayout,
    pub bit_depth: BitDepth,
    pub trim: Option<TrimRange>,
}

impl ConversionSettings {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.volume_percent > MAX_VOLUME_PERCENT {
            return Err(DomainError::invalid_settings(format!(
                "volume {}% exceeds {MAX_VOLUME_PERCENT}%",
                self.volume_percent
            )));
        }
        Ok(())
    }

    pub fn gain(&self) -> f32 {
        f32::from(self.volume_percent) / 100.0
    }

    pub fn wav_format(&self) -> WavFormat {
        WavFormat {
            sample_rate_hz: self.sample_rate.hz(),
            channels: self.channels.count(),
            bit_depth: self.bit_depth,
        }
    }
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            volume_percent: 100,
            sample_rate: SampleRate::Hz44100,
            channels: ChannelLayout::Stereo,
            bit_depth: BitDepth::Sixteen,
            trim: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WavFormat {
    pub sample_rate_hz: u32,
    pub channels: u16,
    pub bit_depth: BitDepth,
}

impl WavFormat {
    /// The header stores block align in 16 bits and byte rate in 32 bits.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.sample_rate_hz == 0 || self.channels == 0 {
            return Err(DomainError::invalid_settings(
                "wav sample rate and channel count must be greater than zero",
            ));
        }
        let block_align = u32::from(self.channels) * u32::from(self.bit_depth.bits() / 8);
        let block_align = u16::try_from(block_align).map_err(|_| {
            DomainError::invalid_settings(format!(
                "{} channels overflow the wav block align field",
                self.channels
            ))
        })?;
        self.sample_rate_hz
            .checked_mul(u32::from(block_align))
            .ok_or_else(|| {
                DomainError::invalid_settings(format!(
                    "{} Hz with {} channels overflows the wav byte rate field",
                    self.sample_rate_hz, self.channels
                ))
            })?;
        Ok(())
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.bit_depth.bytes()
    }

    pub fn block_align(&self) -> u16 {
        self.channels.saturating_mul(self.bit_depth.bits() / 8)
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate_hz
            .saturating_mul(u32::from(self.block_align()))
    }
}

/// Header plus quantized payload. Never mutated after encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct WavContainer {
    format: WavFormat,
    bytes: Vec<u8>,
}

impl WavContainer {
    pub fn from_parts(format: WavFormat, bytes: Vec<u8>) -> Self {
        Self { format, bytes }
    }

    pub fn format(&self) -> WavFormat {
        self.format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data_size() == 0
    }

    pub fn data_size(&self) -> usize {
        self.bytes.len().saturating_sub(WAV_HEADER_LEN)
    }

    pub fn sample_count(&self) -> usize {
        self.data_size() / self.format.bytes_per_sample()
    }

    pub fn duration_seconds(&self) -> f64 {
        let frames = self.sample_count() / usize::from(self.format.channels.max(1));
        frames as f64 / f64::from(self.format.sample_rate_hz.max(1))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioTransformRequest {
    pub source: AudioSampleBuffer,
    pub settings: ConversionSettings,
    pub mode: SampleRateMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformMetadata {
    pub trimmed: bool,
    pub remapped: bool,
    pub resampled: bool,
    pub relabeled: bool,
    pub gain: f32,
    pub input_frame_count: usize,
    pub output_frame_count: usize,
    pub source_sample_rate_hz: u32,
    pub target_sample_rate_hz: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioTransformResult {
    pub buffer: AudioSampleBuffer,
    pub metadata: TransformMetadata,
}

/// Uploaded file as received, before any decoding.
#[derive(Debug, Clone)]
pub struct SourceAudio {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl SourceAudio {
    pub fn extension(&self) -> Option<String> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    pub container: WavContainer,
    pub engine: String,
    /// The container holds synthetic placeholder audio instead of the upload.
    pub degraded: bool,
}

macro_rules! canonical_id {
    ($name:ident, $label:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(Uuid);

        impl $name {
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.simple())
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Uuid::try_parse(value.trim()).map(Self).map_err(|_| {
                    DomainError::InvalidIdentifier(format!("`{value}` is not a valid {}", $label))
                })
            }
        }

        impl TryFrom<String> for $name {
            type Error = DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.to_string()
            }
        }
    };
}

canonical_id!(FileId, "file id");
canonical_id!(ShareId, "share id");

/// Parsed canonical 44-byte header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub format: WavFormat,
    pub data_size: usize,
}

impl WavHeader {
    pub fn duration_seconds(&self) -> f64 {
        let block_align = usize::from(self.format.block_align().max(1));
        (self.data_size / block_align) as f64 / f64::from(self.format.sample_rate_hz.max(1))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub file_id: FileId,
    pub size: u64,
    pub modified_at: OffsetDateTime,
    /// `None` when the stored bytes do not start with a readable WAV header.
    pub header: Option<WavHeader>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRecord {
    pub share_id: ShareId,
    pub file_id: FileId,
    pub original_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl ShareRecord {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
    pub size: u64,
    pub attempts: u32,
}

/// What the startup health check found, reported by `/health`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub system_ffmpeg: bool,
    pub bundled_ffmpeg: bool,
    pub object_storage: bool,
}

impl Capabilities {
    pub fn ffmpeg_available(&self) -> bool {
        self.system_ffmpeg || self.bundled_ffmpeg
    }
}
