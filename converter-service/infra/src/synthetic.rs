use std::f32::consts::TAU;

use converter_domain::{
    ConversionSettings, DomainError, PlaceholderGeneratorPort, WavContainer,
    MAX_PLACEHOLDER_SECONDS,
};

use crate::encode_wav;

const FADE_SECONDS: f32 = 0.01;

/// C, G, Am, F triads.
const PROGRESSION: [[f32; 3]; 4] = [
    [261.63, 329.63, 392.00],
    [196.00, 246.94, 293.66],
    [220.00, 261.63, 329.63],
    [174.61, 220.00, 261.63],
];

#[derive(Debug, Default, Clone, Copy)]
pub struct ChordProgressionGenerator;

impl ChordProgressionGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl PlaceholderGeneratorPort for ChordProgressionGenerator {
    fn name(&self) -> &'static str {
        "synthetic-chords"
    }

    fn generate(
        &self,
        settings: &ConversionSettings,
        duration_seconds: f32,
    ) -> Result<WavContainer, DomainError> {
        let chord_seconds = checked_duration(duration_seconds)? / PROGRESSION.len() as f32;
        render(settings, duration_seconds, 0.2, |t| {
            let index = ((t / chord_seconds) as usize).min(PROGRESSION.len() - 1);
            let local = t - index as f32 * chord_seconds;
            let envelope = fade(local, chord_seconds);
            PROGRESSION[index]
                .iter()
                .map(|frequency| (TAU * frequency * t).sin())
                .sum::<f32>()
                * envelope
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SineToneGenerator {
    frequency_hz: f32,
}

impl SineToneGenerator {
    pub fn new(frequency_hz: f32) -> Self {
        Self { frequency_hz }
    }
}

impl Default for SineToneGenerator {
    fn default() -> Self {
        Self::new(440.0)
    }
}

impl PlaceholderGeneratorPort for SineToneGenerator {
    fn name(&self) -> &'static str {
        "synthetic-sine"
    }

    fn generate(
        &self,
        settings: &ConversionSettings,
        duration_seconds: f32,
    ) -> Result<WavContainer, DomainError> {
        let total = checked_duration(duration_seconds)?;
        let frequency_hz = self.frequency_hz;
        render(settings, duration_seconds, 0.5, |t| {
            (TAU * frequency_hz * t).sin() * fade(t, total)
        })
    }
}

fn checked_duration(duration_seconds: f32) -> Result<f32, DomainError> {
    if !duration_seconds.is_finite()
        || duration_seconds <= 0.0
        || duration_seconds > MAX_PLACEHOLDER_SECONDS
    {
        return Err(DomainError::invalid_settings(format!(
            "placeholder duration {duration_seconds}s must be within (0, {MAX_PLACEHOLDER_SECONDS}]"
        )));
    }
    Ok(duration_seconds)
}

/// Linear fade in and out so segment boundaries do not click.
fn fade(local_seconds: f32, segment_seconds: f32) -> f32 {
    let fade = FADE_SECONDS.min(segment_seconds / 2.0);
    if fade <= 0.0 {
        return 1.0;
    }
    let rise = (local_seconds / fade).min(1.0);
    let fall = ((segment_seconds - local_seconds) / fade).min(1.0);
    rise.min(fall).max(0.0)
}

fn render(
    settings: &ConversionSettings,
    duration_seconds: f32,
    amplitude: f32,
    wave: impl Fn(f32) -> f32,
) -> Result<WavContainer, DomainError> {
    let format = settings.wav_format();
    let channels = usize::from(format.channels);
    let rate = format.sample_rate_hz as f32;
    let frames = (duration_seconds * rate) as usize;
    let gain = settings.gain() * amplitude;

    let mut samples = Vec::with_capacity(frames * channels);
    for frame in 0..frames {
        let value = wave(frame as f32 / rate) * gain;
        samples.extend(std::iter::repeat(value).take(channels));
    }

    encode_wav(&samples, format)
}
