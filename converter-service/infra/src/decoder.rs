use std::io::Cursor;

use converter_domain::{AudioSampleBuffer, DomainError};
use symphonia::core::{
    audio::SampleBuffer, codecs::DecoderOptions, errors::Error as SymphoniaError,
    formats::FormatOptions, io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
};

/// Decodes MP3 bytes into interleaved f32 samples via symphonia.
#[derive(Debug, Default, Clone, Copy)]
pub struct Mp3Decoder;

impl Mp3Decoder {
    pub fn new() -> Self {
        Self
    }

    pub fn decode(
        &self,
        bytes: &[u8],
        extension_hint: Option<&str>,
    ) -> Result<AudioSampleBuffer, DomainError> {
        let stream = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

        let mut hint = Hint::new();
        hint.with_extension(extension_hint.unwrap_or("mp3"));

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|err| DomainError::DecodeFailure(format!("unrecognized audio stream: {err}")))?;

        let mut reader = probed.format;
        let track = reader
            .default_track()
            .ok_or_else(|| DomainError::DecodeFailure("no audio track found".to_string()))?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|err| DomainError::DecodeFailure(format!("unsupported codec: {err}")))?;

        let mut layout: Option<StreamLayout> = None;
        let mut samples = Vec::new();
        let mut skipped_packets = 0_usize;

        loop {
            let packet = match reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref err))
                    if err.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(err) => {
                    return Err(DomainError::DecodeFailure(format!(
                        "failed to read packet: {err}"
                    )));
                }
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(err)) => {
                    skipped_packets += 1;
                    tracing::debug!(error = err, "skipping undecodable mp3 packet");
                    continue;
                }
                Err(err) => {
                    return Err(DomainError::DecodeFailure(format!(
                        "decoder error: {err}"
                    )));
                }
            };

            let spec = *decoded.spec();
            pin_layout(
                &mut layout,
                StreamLayout {
                    sample_rate_hz: spec.rate,
                    channels: spec.channels.count() as u16,
                },
            )?;

            let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            buffer.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buffer.samples());
        }

        let Some(StreamLayout {
            sample_rate_hz,
            channels,
        }) = layout.filter(|_| !samples.is_empty())
        else {
            return Err(DomainError::DecodeFailure(
                "no audio frames could be decoded".to_string(),
            ));
        };

        tracing::debug!(
            sample_rate_hz,
            channels,
            samples = samples.len(),
            skipped_packets,
            "decoded source audio"
        );

        AudioSampleBuffer::new(samples, sample_rate_hz, channels)
            .map_err(|err| DomainError::DecodeFailure(err.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StreamLayout {
    sample_rate_hz: u32,
    channels: u16,
}

/// The first decoded packet fixes the layout; a later change would mix
/// incompatible samples into one buffer.
fn pin_layout(pinned: &mut Option<StreamLayout>, next: StreamLayout) -> Result<(), DomainError> {
    match pinned {
        None => {
            *pinned = Some(next);
            Ok(())
        }
        Some(first) if *first == next => Ok(()),
        Some(first) => Err(DomainError::DecodeFailure(format!(
            "stream changed from {} Hz/{} ch to {} Hz/{} ch mid-file",
            first.sample_rate_hz, first.channels, next.sample_rate_hz, next.channels
        ))),
    }
}
