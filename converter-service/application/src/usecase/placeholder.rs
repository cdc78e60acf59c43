use std::sync::Arc;

use converter_domain::{
    ConversionOutcome, ConversionSettings, DomainError, PlaceholderGeneratorPort,
};

/// Tries each generator in order; the first that renders wins.
pub(crate) fn render_placeholder(
    generators: &[Arc<dyn PlaceholderGeneratorPort>],
    settings: &ConversionSettings,
    duration_seconds: f32,
) -> Result<ConversionOutcome, DomainError> {
    let mut last_error = None;
    for generator in generators {
        match generator.generate(settings, duration_seconds) {
            Ok(container) => {
                tracing::warn!(
                    generator = generator.name(),
                    duration_seconds,
                    "serving synthetic placeholder audio"
                );
                return Ok(ConversionOutcome {
                    container,
                    engine: generator.name().to_string(),
                    degraded: true,
                });
            }
            Err(err) => {
                tracing::warn!(generator = generator.name(), error = %err, "placeholder generator failed");
                last_error = Some(err);
            }
        }
    }

    Err(DomainError::ConversionFailed(match last_error {
        Some(err) => format!("placeholder generation failed: {err}"),
        None => "no placeholder generator is configured".to_string(),
    }))
}
