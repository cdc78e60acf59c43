use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use async_trait::async_trait;
use converter_domain::{
    ChannelLayout, ConversionEnginePort, ConversionSettings, DomainError, SampleRateMode,
    SourceAudio, WavContainer,
};
use tokio::process::Command;

use crate::encode_wav;

const STDERR_TAIL_CHARS: usize = 400;

/// Runs an FFmpeg binary to decode, trim, gain and resample the upload into raw
/// f32 samples, which are then quantized by the shared WAV encoder.
///
/// In [`SampleRateMode::Relabel`] FFmpeg keeps the source rate and only the
/// header declares the target rate.
pub struct FfmpegConversionEngine {
    name: String,
    binary: PathBuf,
    timeout: Duration,
    mode: SampleRateMode,
}

impl FfmpegConversionEngine {
    pub fn new(
        name: impl Into<String>,
        binary: impl Into<PathBuf>,
        timeout: Duration,
        mode: SampleRateMode,
    ) -> Self {
        Self {
            name: name.into(),
            binary: binary.into(),
            timeout,
            mode,
        }
    }
}

#[async_trait]
impl ConversionEnginePort for FfmpegConversionEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn convert(
        &self,
        source: &SourceAudio,
        settings: &ConversionSettings,
    ) -> Result<WavContainer, DomainError> {
        // Removed on drop, whichever way this function returns.
        let workdir = tempfile::Builder::new()
            .prefix("converter-ffmpeg-")
            .tempdir()
            .map_err(|err| {
                DomainError::StorageWriteFailure(format!("cannot create scratch dir: {err}"))
            })?;
        let input_path = workdir.path().join("input.mp3");
        tokio::fs::write(&input_path, &source.bytes)
            .await
            .map_err(|err| {
                DomainError::StorageWriteFailure(format!("cannot stage upload: {err}"))
            })?;

        let mut command = Command::new(&self.binary);
        command
            .args(ffmpeg_args(&input_path, settings, self.mode))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                DomainError::external_service_error(
                    &self.name,
                    &format!("timed out after {}s", self.timeout.as_secs()),
                )
            })?
            .map_err(|err| {
                DomainError::external_service_error(&self.name, &format!("failed to spawn: {err}"))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DomainError::external_service_error(
                &self.name,
                &format!("exited with {}: {}", output.status, stderr_tail(&stderr)),
            ));
        }

        let samples = f32le_samples(&output.stdout, usize::from(settings.channels.count()));
        tracing::debug!(
            engine = %self.name,
            samples = samples.len(),
            "ffmpeg produced raw samples"
        );

        // FFmpeg exits cleanly with an empty stream when `-ss` lies past the end.
        if samples.is_empty() {
            return Err(match settings.trim {
                Some(trim) => DomainError::invalid_trim(format!(
                    "trim start {:.3}s is at or past the end of the audio",
                    trim.start_seconds()
                )),
                None => DomainError::DecodeFailure("ffmpeg produced no audio frames".to_string()),
            });
        }

        encode_wav(&samples, settings.wav_format())
    }
}

fn ffmpeg_args(
    input_path: &Path,
    settings: &ConversionSettings,
    mode: SampleRateMode,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-loglevel", "error", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(input_path.as_os_str().to_owned());

    if let Some(trim) = settings.trim {
        args.push("-ss".into());
        args.push(format!("{:.6}", trim.start_seconds()).into());
        args.push("-to".into());
        args.push(format!("{:.6}", trim.end_seconds()).into());
    }

    let mut filters = Vec::new();
    if settings.volume_percent != 100 {
        filters.push(format!("volume={:.4}", settings.gain()));
    }
    // Downmix keeps the first channel instead of averaging.
    if settings.channels == ChannelLayout::Mono {
        filters.push("pan=mono|c0=c0".to_string());
    }
    if !filters.is_empty() {
        args.push("-filter:a".into());
        args.push(filters.join(",").into());
    }

    args.push("-ac".into());
    args.push(settings.channels.count().to_string().into());
    if mode == SampleRateMode::Resample {
        args.push("-ar".into());
        args.push(settings.sample_rate.hz().to_string().into());
    }

    for arg in [
        "-f".to_string(),
        "f32le".to_string(),
        "-acodec".to_string(),
        "pcm_f32le".to_string(),
        "pipe:1".to_string(),
    ] {
        args.push(arg.into());
    }

    args
}

fn f32le_samples(raw: &[u8], channels: usize) -> Vec<f32> {
    let mut samples: Vec<f32> = raw
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    let whole_frames = samples.len() / channels.max(1) * channels.max(1);
    samples.truncate(whole_frames);
    samples
}

fn stderr_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    let skip = trimmed.chars().count().saturating_sub(STDERR_TAIL_CHARS);
    trimmed.chars().skip(skip).collect()
}

/// Startup health check: runs `<binary> -version` and returns the binary when it works.
pub async fn probe_ffmpeg_binary(binary: &Path, timeout: Duration) -> Option<PathBuf> {
    let mut command = Command::new(binary);
    command
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    match tokio::time::timeout(timeout, command.status()).await {
        Ok(Ok(status)) if status.success() => {
            tracing::info!(binary = %binary.display(), "ffmpeg binary available");
            Some(binary.to_path_buf())
        }
        Ok(Ok(status)) => {
            tracing::warn!(binary = %binary.display(), %status, "ffmpeg probe exited unsuccessfully");
            None
        }
        Ok(Err(err)) => {
            tracing::info!(binary = %binary.display(), error = %err, "ffmpeg binary not found");
            None
        }
        Err(_) => {
            tracing::warn!(binary = %binary.display(), "ffmpeg probe timed out");
            None
        }
    }
}
