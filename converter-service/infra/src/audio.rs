use async_trait::async_trait;
use converter_domain::{
    AudioSampleBuffer, AudioTransformPort, AudioTransformRequest, AudioTransformResult,
    DomainError, SampleRateMode, TransformMetadata, TrimRange,
};

#[derive(Default)]
pub struct AudioTransformerAdapter;

impl AudioTransformerAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AudioTransformPort for AudioTransformerAdapter {
    async fn transform(
        &self,
        request: AudioTransformRequest,
    ) -> Result<AudioTransformResult, DomainError> {
        let result = tokio::task::spawn_blocking(move || transform_buffer(request))
            .await
            .map_err(|err| DomainError::internal_error(&format!("transform task failed: {err}")))??;

        tracing::debug!(
            source_sample_rate_hz = result.metadata.source_sample_rate_hz,
            target_sample_rate_hz = result.metadata.target_sample_rate_hz,
            input_frames = result.metadata.input_frame_count,
            output_frames = result.metadata.output_frame_count,
            trimmed = result.metadata.trimmed,
            remapped = result.metadata.remapped,
            resampled = result.metadata.resampled,
            relabeled = result.metadata.relabeled,
            "audio transformation completed"
        );

        Ok(result)
    }
}

/// Trim, channel remap, gain and sample-rate handling, in that order.
///
/// Gain is not clipped here: samples above 1.0 survive until quantization.
pub fn transform_buffer(
    request: AudioTransformRequest,
) -> Result<AudioTransformResult, DomainError> {
    let AudioTransformRequest {
        source,
        settings,
        mode,
    } = request;
    settings.validate()?;
    if source.sample_rate_hz == 0 || source.channels == 0 {
        return Err(DomainError::invalid_settings(
            "source sample rate and channel count must be greater than zero",
        ));
    }

    let source_sample_rate_hz = source.sample_rate_hz;
    let source_channels = usize::from(source.channels);
    let target_channels = usize::from(settings.channels.count());
    let target_sample_rate_hz = settings.sample_rate.hz();
    let input_frame_count = source.frame_count();

    let mut samples = source.samples;
    let trimmed = match settings.trim {
        Some(trim) => {
            samples = trim_frames(&samples, source_channels, source_sample_rate_hz, trim)?;
            true
        }
        None => false,
    };

    let remapped = source_channels != target_channels;
    if remapped {
        samples = remap_channels(&samples, source_channels, target_channels);
    }

    let gain = settings.gain();
    if settings.volume_percent != 100 {
        for sample in &mut samples {
            *sample *= gain;
        }
    }

    let rates_differ = source_sample_rate_hz != target_sample_rate_hz;
    let (resampled, relabeled) = match mode {
        SampleRateMode::Resample if rates_differ && !samples.is_empty() => {
            samples = resample_linear(
                &samples,
                target_channels,
                source_sample_rate_hz,
                target_sample_rate_hz,
            );
            (true, false)
        }
        SampleRateMode::Relabel if rates_differ => {
            tracing::warn!(
                source_sample_rate_hz,
                target_sample_rate_hz,
                "sample rate relabeled without resampling; pitch and speed will change"
            );
            (false, true)
        }
        _ => (false, false),
    };

    let buffer = AudioSampleBuffer {
        samples,
        sample_rate_hz: target_sample_rate_hz,
        channels: settings.channels.count(),
    };
    let metadata = TransformMetadata {
        trimmed,
        remapped,
        resampled,
        relabeled,
        gain,
        input_frame_count,
        output_frame_count: buffer.frame_count(),
        source_sample_rate_hz,
        target_sample_rate_hz,
    };

    Ok(AudioTransformResult { buffer, metadata })
}

fn trim_frames(
    samples: &[f32],
    channels: usize,
    sample_rate_hz: u32,
    trim: TrimRange,
) -> Result<Vec<f32>, DomainError> {
    let frame_count = samples.len() / channels;
    let rate = f64::from(sample_rate_hz);
    let start_frame = (trim.start_seconds() * rate).floor() as usize;
    let end_frame = ((trim.end_seconds() * rate).floor() as usize).min(frame_count);

    if start_frame >= end_frame {
        return Err(DomainError::invalid_trim(format!(
            "trim [{}s, {}s) selects no audio from a {:.3}s source",
            trim.start_seconds(),
            trim.end_seconds(),
            frame_count as f64 / rate
        )));
    }

    Ok(samples[start_frame * channels..end_frame * channels].to_vec())
}

/// Output channel `c` copies source channel `min(c, source - 1)`: mono is
/// duplicated into every output channel and downmixing keeps the left channel.
fn remap_channels(samples: &[f32], source_channels: usize, target_channels: usize) -> Vec<f32> {
    let frame_count = samples.len() / source_channels;
    let mut output = Vec::with_capacity(frame_count * target_channels);
    for frame in samples.chunks_exact(source_channels) {
        for channel in 0..target_channels {
            output.push(frame[channel.min(source_channels - 1)]);
        }
    }
    output
}

fn resample_linear(
    samples: &[f32],
    channels: usize,
    source_rate_hz: u32,
    target_rate_hz: u32,
) -> Vec<f32> {
    let frame_count = samples.len() / channels;
    if source_rate_hz == target_rate_hz || frame_count <= 1 {
        return samples.to_vec();
    }

    let output_frames = ((frame_count as u64 * u64::from(target_rate_hz))
        / u64::from(source_rate_hz))
    .max(1) as usize;

    let mut output = Vec::with_capacity(output_frames * channels);
    let max_source_frame = frame_count - 1;
    let step = f64::from(source_rate_hz) / f64::from(target_rate_hz);

    for out_idx in 0..output_frames {
        let source_pos = out_idx as f64 * step;
        let left_idx = (source_pos.floor() as usize).min(max_source_frame);
        let right_idx = (left_idx + 1).min(max_source_frame);
        let frac = (source_pos - left_idx as f64) as f32;

        for channel in 0..channels {
            let left = samples[left_idx * channels + channel];
            let right = samples[right_idx * channels + channel];
            output.push(left * (1.0 - frac) + right * frac);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use converter_domain::{BitDepth, ChannelLayout, ConversionSettings, SampleRate};

    fn stereo_ramp(seconds: f64, sample_rate_hz: u32) -> AudioSampleBuffer {
        let frames = (seconds * f64::from(sample_rate_hz)) as usize;
        let samples = (0..frames)
            .flat_map(|i| {
                let value = (i as f32 / frames as f32) * 2.0 - 1.0;
                [value, -value]
            })
            .collect();
        AudioSampleBuffer::new(samples, sample_rate_hz, 2).expect("valid buffer")
    }

    fn settings(volume_percent: u16, trim: Option<TrimRange>) -> ConversionSettings {
        ConversionSettings {
            volume_percent,
            sample_rate: SampleRate::Hz44100,
            channels: ChannelLayout::Stereo,
            bit_depth: BitDepth::Sixteen,
            trim,
        }
    }

    fn run(source: AudioSampleBuffer, settings: ConversionSettings) -> AudioTransformResult {
        transform_buffer(AudioTransformRequest {
            source,
            settings,
            mode: SampleRateMode::Resample,
        })
        .expect("transform succeeds")
    }

    #[test]
    fn full_volume_without_changes_is_identity() {
        let source = stereo_ramp(0.5, 44_100);
        let result = run(source.clone(), settings(100, None));

        assert_eq!(result.buffer, source);
        assert!(!result.metadata.trimmed);
        assert!(!result.metadata.remapped);
        assert!(!result.metadata.resampled);
    }

    #[test]
    fn trim_keeps_expected_sample_count() {
        let cases = [(0.0, 1.0), (0.25, 0.75), (1.1, 2.35), (0.0, 3.0)];
        for (start, end) in cases {
            let trim = TrimRange::new(start, end).unwrap();
            let result = run(stereo_ramp(3.0, 44_100), settings(100, Some(trim)));
            let expected = ((end - start) * 44_100.0).round() as i64 * 2;
            let actual = result.buffer.samples.len() as i64;
            assert!(
                (actual - expected).abs() <= 2,
                "trim [{start}, {end}) produced {actual} samples, expected ~{expected}"
            );
        }
    }

    #[test]
    fn trim_end_beyond_source_is_clamped() {
        let trim = TrimRange::new(0.5, 10.0).unwrap();
        let result = run(stereo_ramp(1.0, 44_100), settings(100, Some(trim)));
        assert_eq!(result.buffer.frame_count(), 22_050);
    }

    #[test]
    fn trim_starting_after_source_end_fails() {
        let trim = TrimRange::new(2.0, 3.0).unwrap();
        let error = transform_buffer(AudioTransformRequest {
            source: stereo_ramp(1.0, 44_100),
            settings: settings(100, Some(trim)),
            mode: SampleRateMode::Resample,
        })
        .unwrap_err();
        assert!(matches!(error, DomainError::InvalidTrimRange(_)));
    }

    #[test]
    fn volume_scales_without_clipping() {
        let source = AudioSampleBuffer::new(vec![0.8, -0.8, 0.25, -0.25], 44_100, 2).unwrap();
        let result = run(source, settings(200, None));
        assert_eq!(result.buffer.samples, vec![1.6, -1.6, 0.5, -0.5]);

        let source = AudioSampleBuffer::new(vec![0.8, -0.4], 44_100, 2).unwrap();
        let result = run(source, settings(50, None));
        assert_eq!(result.buffer.samples, vec![0.4, -0.2]);
    }

    #[test]
    fn mono_is_duplicated_into_stereo() {
        let source = AudioSampleBuffer::new(vec![0.1, 0.2, 0.3], 44_100, 1).unwrap();
        let result = run(source, settings(100, None));
        assert_eq!(result.buffer.channels, 2);
        assert_eq!(result.buffer.samples, vec![0.1, 0.1, 0.2, 0.2, 0.3, 0.3]);
        assert!(result.metadata.remapped);
    }

    #[test]
    fn stereo_downmix_keeps_left_channel() {
        let source = AudioSampleBuffer::new(vec![0.1, 0.9, 0.2, 0.8], 44_100, 2).unwrap();
        let mut mono = settings(100, None);
        mono.channels = ChannelLayout::Mono;
        let result = run(source, mono);
        assert_eq!(result.buffer.channels, 1);
        assert_eq!(result.buffer.samples, vec![0.1, 0.2]);
    }

    #[test]
    fn resample_mode_changes_frame_count() {
        let source = stereo_ramp(1.0, 48_000);
        let result = run(source, settings(100, None));
        assert!(result.metadata.resampled);
        assert_eq!(result.buffer.sample_rate_hz, 44_100);
        assert_eq!(result.buffer.frame_count(), 44_100);
    }

    #[test]
    fn relabel_mode_keeps_samples_and_declares_target_rate() {
        let source = stereo_ramp(0.1, 48_000);
        let result = transform_buffer(AudioTransformRequest {
            source: source.clone(),
            settings: settings(100, None),
            mode: SampleRateMode::Relabel,
        })
        .unwrap();
        assert!(result.metadata.relabeled);
        assert!(!result.metadata.resampled);
        assert_eq!(result.buffer.samples, source.samples);
        assert_eq!(result.buffer.sample_rate_hz, 44_100);
    }

    #[tokio::test]
    async fn adapter_runs_transform_off_the_reactor() {
        let adapter = AudioTransformerAdapter::new();
        let result = adapter
            .transform(AudioTransformRequest {
                source: stereo_ramp(0.2, 22_050),
                settings: settings(100, None),
                mode: SampleRateMode::Resample,
            })
            .await
            .expect("adapter runs");

        assert_eq!(result.buffer.sample_rate_hz, 44_100);
        assert_eq!(result.metadata.input_frame_count, 4_410);
        assert_eq!(result.metadata.output_frame_count, 8_820);
    }
}
