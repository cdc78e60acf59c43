use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Error};
use converter_application::{
    ConversionPolicy, ConvertAudioUseCase, ConvertAudioUseCaseImpl, ProxyUploadUseCase,
    ProxyUploadUseCaseImpl, PurgeExpiredUseCase, PurgeExpiredUseCaseImpl,
    RetrieveConversionUseCase, RetrieveConversionUseCaseImpl, ShareUseCase, ShareUseCaseImpl,
};
use converter_configuration::{AppConfig, ConversionConfig, SampleRateModeConfig, ServerConfig};
use converter_domain::{
    BitDepth, ChannelLayout, Clock, ConversionEnginePort, ConversionSettings, FileStorePort,
    ObjectStoragePort, PlaceholderGeneratorPort, SampleRate, SampleRateMode, ShareStorePort,
};
use converter_http_server::{create_app_routes, AppState, Capabilities};
use converter_infra::{
    probe_ffmpeg_binary, AudioTransformerAdapter, ChordProgressionGenerator,
    FfmpegConversionEngine, FsFileStore, FsShareStore, HttpObjectStorage,
    NativeConversionEngine, RetryPolicy, SineToneGenerator, SystemClock,
};
use tokio::task::JoinHandle;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const FALLBACK_TONE_HZ: f32 = 440.0;

pub async fn build_and_run(config: AppConfig, server_config: ServerConfig) -> Result<(), Error> {
    let app = Application::new(config).await?;
    app.run(server_config).await
}

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
    pub purge: Arc<dyn PurgeExpiredUseCase>,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self, Error> {
        tracing::info!(
            storage_root = %config.storage.root_dir,
            ffmpeg_enabled = config.ffmpeg.enabled,
            object_storage_enabled = config.object_storage.enabled,
            "initializing converter application"
        );

        let ffmpeg_timeout = Duration::from_secs(config.ffmpeg.timeout_secs);
        let (system_ffmpeg, bundled_ffmpeg) = if config.ffmpeg.enabled {
            (
                probe_ffmpeg_binary(&PathBuf::from(&config.ffmpeg.system_binary), PROBE_TIMEOUT)
                    .await,
                probe_ffmpeg_binary(&PathBuf::from(&config.ffmpeg.bundled_binary), PROBE_TIMEOUT)
                    .await,
            )
        } else {
            tracing::info!("ffmpeg disabled by configuration");
            (None, None)
        };

        let rate_mode = sample_rate_mode(config.conversion.sample_rate_mode);
        let mut engines: Vec<Arc<dyn ConversionEnginePort>> = Vec::new();
        if let Some(binary) = &system_ffmpeg {
            engines.push(Arc::new(FfmpegConversionEngine::new(
                "ffmpeg-system",
                binary.clone(),
                ffmpeg_timeout,
                rate_mode,
            )));
        }
        if let Some(binary) = &bundled_ffmpeg {
            engines.push(Arc::new(FfmpegConversionEngine::new(
                "ffmpeg-bundled",
                binary.clone(),
                ffmpeg_timeout,
                rate_mode,
            )));
        }
        engines.push(Arc::new(NativeConversionEngine::new(
            Arc::new(AudioTransformerAdapter::new()),
            rate_mode,
        )));

        let placeholders: Vec<Arc<dyn PlaceholderGeneratorPort>> = vec![
            Arc::new(ChordProgressionGenerator::new()),
            Arc::new(SineToneGenerator::new(FALLBACK_TONE_HZ)),
        ];

        let root = PathBuf::from(&config.storage.root_dir);
        let file_store: Arc<dyn FileStorePort> = Arc::new(FsFileStore::new(root.clone()));
        let share_store: Arc<dyn ShareStorePort> = Arc::new(FsShareStore::new(root.join("shares")));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let object_storage = build_object_storage(&config)?;

        let policy = ConversionPolicy {
            max_upload_bytes: config.conversion.max_upload_bytes,
            defaults: default_settings(&config.conversion)?,
            allow_degraded: config.conversion.allow_degraded,
            placeholder_seconds: config.conversion.placeholder_seconds,
        };

        let capabilities = Capabilities {
            system_ffmpeg: system_ffmpeg.is_some(),
            bundled_ffmpeg: bundled_ffmpeg.is_some(),
            object_storage: object_storage.is_some(),
        };

        let mut convert = ConvertAudioUseCaseImpl::new(
            engines,
            placeholders.clone(),
            file_store.clone(),
            policy.clone(),
        )
        .with_ffmpeg_available(capabilities.ffmpeg_available());
        if let Some(bucket) = &object_storage {
            convert = convert.with_object_storage(bucket.clone());
        }
        let convert: Arc<dyn ConvertAudioUseCase> = Arc::new(convert);
        let retrieve: Arc<dyn RetrieveConversionUseCase> = Arc::new(
            RetrieveConversionUseCaseImpl::new(file_store.clone(), placeholders, policy),
        );
        let share: Arc<dyn ShareUseCase> = Arc::new(ShareUseCaseImpl::new(
            share_store.clone(),
            file_store.clone(),
            clock.clone(),
            hours(config.share.expiry_hours)?,
            config.share.public_base_url.clone(),
        ));
        let upload: Arc<dyn ProxyUploadUseCase> = Arc::new(ProxyUploadUseCaseImpl::new(
            object_storage,
            config.conversion.max_upload_bytes,
        ));
        let purge: Arc<dyn PurgeExpiredUseCase> = Arc::new(PurgeExpiredUseCaseImpl::new(
            file_store,
            share_store,
            clock,
            hours(config.storage.retention_hours)?,
        ));

        tracing::info!(
            system_ffmpeg = capabilities.system_ffmpeg,
            bundled_ffmpeg = capabilities.bundled_ffmpeg,
            object_storage = capabilities.object_storage,
            "converter capabilities resolved"
        );

        Ok(Self {
            state: AppState::new(convert, retrieve, share, upload, capabilities),
            purge,
            config,
        })
    }

    pub async fn run(self, server_config: ServerConfig) -> Result<(), Error> {
        tracing::info!(
            host = %server_config.host,
            port = server_config.port,
            "starting converter HTTP server"
        );

        let purge_task = spawn_purge_task(
            self.purge,
            Duration::from_secs(self.config.storage.purge_interval_secs),
        );
        let result = create_app_routes(self.state, server_config)
            .await
            .map_err(|err| anyhow::anyhow!("server startup failed: {err:#}"));
        purge_task.abort();
        result
    }
}

fn spawn_purge_task(purge: Arc<dyn PurgeExpiredUseCase>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match purge.purge().await {
                Ok(report) => tracing::debug!(
                    removed_files = report.removed_files,
                    removed_shares = report.removed_shares,
                    "purge pass finished"
                ),
                Err(err) => tracing::warn!(error = %err, "purge pass failed"),
            }
        }
    })
}

fn sample_rate_mode(mode: SampleRateModeConfig) -> SampleRateMode {
    match mode {
        SampleRateModeConfig::Resample => SampleRateMode::Resample,
        SampleRateModeConfig::Relabel => SampleRateMode::Relabel,
    }
}

fn default_settings(conversion: &ConversionConfig) -> Result<ConversionSettings, Error> {
    Ok(ConversionSettings {
        sample_rate: SampleRate::try_from(conversion.default_sample_rate_hz)
            .context("conversion.default_sample_rate_hz")?,
        channels: ChannelLayout::try_from(conversion.default_channels)
            .context("conversion.default_channels")?,
        bit_depth: BitDepth::try_from(conversion.default_bit_depth)
            .context("conversion.default_bit_depth")?,
        ..ConversionSettings::default()
    })
}

fn hours(value: u64) -> Result<time::Duration, Error> {
    let value = i64::try_from(value).context("hour count does not fit a duration")?;
    Ok(time::Duration::hours(value))
}

fn build_object_storage(config: &AppConfig) -> Result<Option<Arc<dyn ObjectStoragePort>>, Error> {
    let settings = &config.object_storage;
    if !settings.enabled {
        return Ok(None);
    }

    let endpoint = settings
        .endpoint
        .clone()
        .context("object_storage.endpoint is required")?;
    let bucket = settings
        .bucket
        .clone()
        .context("object_storage.bucket is required")?;
    let retry = RetryPolicy {
        max_attempts: settings.max_attempts,
        attempt_timeout: Duration::from_secs(settings.attempt_timeout_secs),
        initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
    };

    let storage = HttpObjectStorage::new(
        endpoint,
        bucket,
        settings.access_token.clone(),
        settings.public_base_url.clone(),
        retry,
    )
    .context("cannot build object storage client")?;
    Ok(Some(Arc::new(storage)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_config(root: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.ffmpeg.enabled = false;
        config.storage.root_dir = root.display().to_string();
        config
    }

    #[tokio::test]
    async fn reports_no_optional_capabilities_when_offline() {
        let dir = tempfile::tempdir().unwrap();
        let app = Application::new(offline_config(dir.path())).await.unwrap();

        assert_eq!(app.state.capabilities, Capabilities::default());
    }

    #[tokio::test]
    async fn object_storage_is_reported_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = offline_config(dir.path());
        config.object_storage.enabled = true;
        config.object_storage.endpoint = Some("http://127.0.0.1:9".to_string());
        config.object_storage.bucket = Some("audio".to_string());

        let app = Application::new(config).await.unwrap();
        assert!(app.state.capabilities.object_storage);
    }

    #[test]
    fn unsupported_defaults_fail_startup() {
        let conversion = ConversionConfig {
            default_sample_rate_hz: 12_345,
            ..ConversionConfig::default()
        };
        let error = default_settings(&conversion).unwrap_err();
        assert!(format!("{error:#}").contains("default_sample_rate_hz"));

        assert_eq!(
            sample_rate_mode(SampleRateModeConfig::Relabel),
            SampleRateMode::Relabel
        );
    }
}
