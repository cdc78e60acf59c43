use converter_domain::{
    BitDepth, DomainError, WavContainer, WavFormat, WavHeader, WAV_HEADER_LEN,
};

const PCM_FORMAT_TAG: u16 = 1;
const IEEE_FLOAT_FORMAT_TAG: u16 = 3;
const FMT_CHUNK_LEN: u32 = 16;

/// Serializes interleaved float samples into a RIFF/WAVE container.
///
/// Samples are clamped to [-1, 1] before quantization. The output is exactly
/// `44 + samples.len() * bytes_per_sample` bytes; empty input yields a bare header.
/// The fmt chunk always declares PCM (tag 1), 32-bit payloads included.
pub fn encode_wav(samples: &[f32], format: WavFormat) -> Result<WavContainer, DomainError> {
    format.validate()?;

    let data_size = samples
        .len()
        .checked_mul(format.bytes_per_sample())
        .and_then(|size| u32::try_from(size).ok())
        .filter(|size| size.checked_add(36).is_some())
        .ok_or_else(|| {
            DomainError::invalid_settings(format!(
                "{} samples exceed the 4 GiB RIFF size limit",
                samples.len()
            ))
        })?;

    let mut bytes = Vec::with_capacity(WAV_HEADER_LEN + data_size as usize);
    write_header(&mut bytes, format, data_size);

    match format.bit_depth {
        BitDepth::Sixteen => {
            for &sample in samples {
                bytes.extend_from_slice(&quantize_i16(sample).to_le_bytes());
            }
        }
        BitDepth::TwentyFour => {
            for &sample in samples {
                bytes.extend_from_slice(&quantize_i24(sample).to_le_bytes()[..3]);
            }
        }
        BitDepth::ThirtyTwoFloat => {
            for &sample in samples {
                bytes.extend_from_slice(&clamp_sample(sample).to_le_bytes());
            }
        }
    }

    Ok(WavContainer::from_parts(format, bytes))
}

fn write_header(bytes: &mut Vec<u8>, format: WavFormat, data_size: u32) {
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_size).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
    bytes.extend_from_slice(&PCM_FORMAT_TAG.to_le_bytes());
    bytes.extend_from_slice(&format.channels.to_le_bytes());
    bytes.extend_from_slice(&format.sample_rate_hz.to_le_bytes());
    bytes.extend_from_slice(&format.byte_rate().to_le_bytes());
    bytes.extend_from_slice(&format.block_align().to_le_bytes());
    bytes.extend_from_slice(&format.bit_depth.bits().to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_size.to_le_bytes());
}

fn clamp_sample(sample: f32) -> f32 {
    if sample.is_nan() {
        0.0
    } else {
        sample.clamp(-1.0, 1.0)
    }
}

fn quantize_i16(sample: f32) -> i16 {
    let sample = clamp_sample(sample);
    if sample < 0.0 {
        (sample * 32_768.0) as i16
    } else {
        (sample * 32_767.0) as i16
    }
}

fn quantize_i24(sample: f32) -> i32 {
    let sample = clamp_sample(sample);
    if sample < 0.0 {
        (sample * 8_388_608.0) as i32
    } else {
        (sample * 8_388_607.0) as i32
    }
}

/// Reads back a header written by [`encode_wav`].
pub fn read_wav_header(bytes: &[u8]) -> Result<WavHeader, DomainError> {
    read_wav_header_prefix(bytes, bytes.len() as u64)
}

/// Same as [`read_wav_header`] when only the leading bytes of a `total_len`
/// byte file are in memory.
pub fn read_wav_header_prefix(bytes: &[u8], total_len: u64) -> Result<WavHeader, DomainError> {
    if bytes.len() < WAV_HEADER_LEN {
        return Err(DomainError::DecodeFailure(format!(
            "wav file is {} bytes, shorter than its header",
            bytes.len()
        )));
    }

    expect_tag(bytes, 0, b"RIFF")?;
    expect_tag(bytes, 8, b"WAVE")?;
    expect_tag(bytes, 12, b"fmt ")?;
    expect_tag(bytes, 36, b"data")?;

    if read_u32(bytes, 16) != FMT_CHUNK_LEN {
        return Err(DomainError::DecodeFailure(
            "unsupported fmt chunk length".to_string(),
        ));
    }
    let format_tag = read_u16(bytes, 20);
    if format_tag != PCM_FORMAT_TAG && format_tag != IEEE_FLOAT_FORMAT_TAG {
        return Err(DomainError::DecodeFailure(format!(
            "unsupported wav format tag {format_tag}"
        )));
    }

    let channels = read_u16(bytes, 22);
    let sample_rate_hz = read_u32(bytes, 24);
    let bit_depth = BitDepth::try_from(read_u16(bytes, 34))
        .map_err(|err| DomainError::DecodeFailure(err.to_string()))?;
    let format = WavFormat {
        sample_rate_hz,
        channels,
        bit_depth,
    };

    format
        .validate()
        .map_err(|err| DomainError::DecodeFailure(format!("unusable wav header: {err}")))?;
    if read_u16(bytes, 32) != format.block_align() || read_u32(bytes, 28) != format.byte_rate() {
        return Err(DomainError::DecodeFailure(
            "wav header block align or byte rate is inconsistent".to_string(),
        ));
    }

    let data_size = read_u32(bytes, 40) as usize;
    let available = total_len.saturating_sub(WAV_HEADER_LEN as u64);
    if data_size as u64 > available {
        return Err(DomainError::DecodeFailure(format!(
            "wav data chunk declares {data_size} bytes but only {available} are present"
        )));
    }

    Ok(WavHeader { format, data_size })
}

fn expect_tag(bytes: &[u8], offset: usize, tag: &[u8; 4]) -> Result<(), DomainError> {
    if &bytes[offset..offset + 4] == tag {
        Ok(())
    } else {
        Err(DomainError::DecodeFailure(format!(
            "missing `{}` tag at byte {offset}",
            String::from_utf8_lossy(tag)
        )))
    }
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use converter_domain::SampleRate;

    fn format(sample_rate_hz: u32, channels: u16, bit_depth: BitDepth) -> WavFormat {
        WavFormat {
            sample_rate_hz,
            channels,
            bit_depth,
        }
    }

    fn i16_at(bytes: &[u8], index: usize) -> i16 {
        let offset = WAV_HEADER_LEN + index * 2;
        i16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    #[test]
    fn header_fields_match_every_supported_format() {
        let samples = vec![0.25_f32; 12];
        for rate in SampleRate::ALL {
            for channels in [1_u16, 2] {
                for depth in [BitDepth::Sixteen, BitDepth::TwentyFour, BitDepth::ThirtyTwoFloat] {
                    let container =
                        encode_wav(&samples, format(rate.hz(), channels, depth)).unwrap();
                    let bytes = container.bytes();
                    let data_size = 12 * depth.bytes() as u32;

                    assert_eq!(&bytes[0..4], b"RIFF");
                    assert_eq!(read_u32(bytes, 4), 36 + data_size);
                    assert_eq!(&bytes[8..16], b"WAVEfmt ");
                    assert_eq!(read_u32(bytes, 16), 16);
                    assert_eq!(read_u16(bytes, 20), 1);
                    assert_eq!(read_u16(bytes, 22), channels);
                    assert_eq!(read_u32(bytes, 24), rate.hz());
                    assert_eq!(
                        read_u32(bytes, 28),
                        rate.hz() * u32::from(channels) * u32::from(depth.bits() / 8)
                    );
                    assert_eq!(read_u16(bytes, 32), channels * (depth.bits() / 8));
                    assert_eq!(read_u16(bytes, 34), depth.bits());
                    assert_eq!(&bytes[36..40], b"data");
                    assert_eq!(read_u32(bytes, 40), data_size);
                }
            }
        }
    }

    #[test]
    fn output_length_is_header_plus_payload() {
        let samples: Vec<f32> = (0..1001).map(|i| (i as f32 / 1000.0).sin()).collect();
        for depth in [BitDepth::Sixteen, BitDepth::TwentyFour, BitDepth::ThirtyTwoFloat] {
            let container = encode_wav(&samples, format(44_100, 1, depth)).unwrap();
            assert_eq!(container.len(), 44 + samples.len() * depth.bytes());
            assert_eq!(container.sample_count(), samples.len());
        }
    }

    #[test]
    fn sixteen_bit_quantization_boundaries_and_clamping() {
        let container = encode_wav(
            &[1.0, -1.0, 0.0, 0.5, 3.0, -7.5, f32::NAN],
            format(44_100, 1, BitDepth::Sixteen),
        )
        .unwrap();
        let bytes = container.bytes();

        assert_eq!(i16_at(bytes, 0), 32_767);
        assert_eq!(i16_at(bytes, 1), -32_768);
        assert_eq!(i16_at(bytes, 2), 0);
        assert_eq!(i16_at(bytes, 3), 16_383);
        assert_eq!(i16_at(bytes, 4), 32_767);
        assert_eq!(i16_at(bytes, 5), -32_768);
        assert_eq!(i16_at(bytes, 6), 0);
    }

    #[test]
    fn twenty_four_bit_packs_three_little_endian_bytes() {
        let container =
            encode_wav(&[1.0, -1.0, 2.0], format(48_000, 1, BitDepth::TwentyFour)).unwrap();
        let payload = &container.bytes()[WAV_HEADER_LEN..];
        assert_eq!(payload, &[0xFF, 0xFF, 0x7F, 0x00, 0x00, 0x80, 0xFF, 0xFF, 0x7F]);
    }

    #[test]
    fn thirty_two_bit_writes_clamped_floats() {
        let container = encode_wav(
            &[0.123, -1.5, 1.0],
            format(48_000, 1, BitDepth::ThirtyTwoFloat),
        )
        .unwrap();
        let payload = &container.bytes()[WAV_HEADER_LEN..];
        let values: Vec<f32> = payload
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        assert_eq!(values, vec![0.123, -1.0, 1.0]);
    }

    #[test]
    fn empty_input_produces_bare_header() {
        let container = encode_wav(&[], format(44_100, 2, BitDepth::Sixteen)).unwrap();
        assert_eq!(container.len(), 44);
        assert_eq!(read_u32(container.bytes(), 40), 0);
        assert_eq!(read_u32(container.bytes(), 4), 36);
        assert!(container.is_empty());
    }

    #[test]
    fn channel_counts_beyond_the_header_fields_are_rejected() {
        let error = encode_wav(&[0.0; 4], format(44_100, 20_000, BitDepth::ThirtyTwoFloat))
            .unwrap_err();
        assert!(matches!(error, DomainError::InvalidSettings(_)));

        let error = encode_wav(&[0.0; 4], format(44_100, 0, BitDepth::Sixteen)).unwrap_err();
        assert!(matches!(error, DomainError::InvalidSettings(_)));
    }

    #[test]
    fn header_reads_back() {
        let wav_format = format(32_000, 2, BitDepth::TwentyFour);
        let container = encode_wav(&vec![0.0; 64_000], wav_format).unwrap();
        let header = read_wav_header(container.bytes()).unwrap();
        assert_eq!(header.format, wav_format);
        assert_eq!(header.data_size, 64_000 * 3);
        assert_eq!(header.duration_seconds(), 1.0);
    }

    #[test]
    fn header_prefix_is_checked_against_file_length() {
        let container = encode_wav(&[0.1; 10], format(44_100, 1, BitDepth::Sixteen)).unwrap();
        let prefix = &container.bytes()[..WAV_HEADER_LEN];

        let header = read_wav_header_prefix(prefix, container.len() as u64).unwrap();
        assert_eq!(header.data_size, 20);
        assert!(read_wav_header_prefix(prefix, 50).is_err());
    }

    #[test]
    fn header_reader_rejects_garbage_and_truncation() {
        assert!(matches!(
            read_wav_header(b"ID3\x04not a wav file at all, just some bytes"),
            Err(DomainError::DecodeFailure(_))
        ));

        let container = encode_wav(&[0.5; 8], format(44_100, 2, BitDepth::Sixteen)).unwrap();
        let truncated = &container.bytes()[..50];
        assert!(read_wav_header(truncated).is_err());
    }

    #[test]
    fn standard_decoder_reads_integer_output() {
        let samples: Vec<f32> = (0..200).map(|i| ((i as f32) * 0.05).sin() * 0.8).collect();
        for depth in [BitDepth::Sixteen, BitDepth::TwentyFour] {
            let container = encode_wav(&samples, format(22_050, 2, depth)).unwrap();
            let reader = hound::WavReader::new(Cursor::new(container.into_bytes()))
                .expect("hound parses header");
            let spec = reader.spec();
            assert_eq!(spec.channels, 2);
            assert_eq!(spec.sample_rate, 22_050);
            assert_eq!(spec.bits_per_sample, depth.bits());
            assert_eq!(reader.len() as usize, samples.len());
        }
    }
}
