use tracing_subscriber::EnvFilter;

use crate::{ConverterConfig, LogFormat};

/// Installs the global fmt subscriber. `RUST_LOG` wins over `logging.level`.
pub fn setup_logging(config: &ConverterConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Full => builder.try_init(),
    };

    match installed {
        Ok(()) => tracing::debug!(
            level = %config.logging.level,
            format = ?config.logging.format,
            "logging initialized"
        ),
        // Tests and embedders may have installed a subscriber already.
        Err(err) => tracing::debug!(error = %err, "global subscriber already set"),
    }
}
