use serde::{Deserialize, Serialize};

mod loader;
mod logging;

pub use loader::{load_config, load_config_from, ConfigError, CONFIG_PREFIX};
pub use logging::setup_logging;

pub type AppConfig = ConverterConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ConverterConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub conversion: ConversionConfig,
    #[serde(default)]
    pub ffmpeg: FfmpegConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub share: ShareConfig,
    #[serde(default)]
    pub object_storage: ObjectStorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Request body ceiling enforced by the router, multipart included.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Full,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionConfig {
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    #[serde(default = "default_sample_rate")]
    pub default_sample_rate_hz: u32,
    #[serde(default = "default_channels")]
    pub default_channels: u16,
    #[serde(default = "default_bit_depth")]
    pub default_bit_depth: u16,
    #[serde(default)]
    pub sample_rate_mode: SampleRateModeConfig,
    #[serde(default = "default_true")]
    pub allow_degraded: bool,
    #[serde(default = "default_placeholder_seconds")]
    pub placeholder_seconds: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleRateModeConfig {
    #[default]
    Resample,
    Relabel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FfmpegConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_system_binary")]
    pub system_binary: String,
    #[serde(default = "default_bundled_binary")]
    pub bundled_binary: String,
    #[serde(default = "default_ffmpeg_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_root_dir")]
    pub root_dir: String,
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareConfig {
    #[serde(default = "default_expiry_hours")]
    pub expiry_hours: u64,
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_base_url: Option<String>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl ConverterConfig {
    /// Cross-field checks serde defaults cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let conversion = &self.conversion;
        if conversion.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid(
                "conversion.max_upload_bytes must be greater than zero".to_string(),
            ));
        }
        if !(conversion.placeholder_seconds > 0.0 && conversion.placeholder_seconds <= 600.0) {
            return Err(ConfigError::Invalid(format!(
                "conversion.placeholder_seconds must be within (0, 600], got {}",
                conversion.placeholder_seconds
            )));
        }
        if self.storage.retention_hours == 0 || self.share.expiry_hours == 0 {
            return Err(ConfigError::Invalid(
                "storage.retention_hours and share.expiry_hours must be at least 1".to_string(),
            ));
        }
        if self.storage.purge_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "storage.purge_interval_secs must be greater than zero".to_string(),
            ));
        }

        let object_storage = &self.object_storage;
        if object_storage.enabled {
            let missing = |value: &Option<String>| value.as_deref().map_or(true, str::is_empty);
            if missing(&object_storage.endpoint) || missing(&object_storage.bucket) {
                return Err(ConfigError::Invalid(
                    "object_storage.endpoint and object_storage.bucket are required when object storage is enabled"
                        .to_string(),
                ));
            }
            if object_storage.max_attempts == 0 {
                return Err(ConfigError::Invalid(
                    "object_storage.max_attempts must be at least 1".to_string(),
                ));
            }
        }

        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            default_sample_rate_hz: default_sample_rate(),
            default_channels: default_channels(),
            default_bit_depth: default_bit_depth(),
            sample_rate_mode: SampleRateModeConfig::default(),
            allow_degraded: true,
            placeholder_seconds: default_placeholder_seconds(),
        }
    }
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            system_binary: default_system_binary(),
            bundled_binary: default_bundled_binary(),
            timeout_secs: default_ffmpeg_timeout_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            retention_hours: default_retention_hours(),
            purge_interval_secs: default_purge_interval_secs(),
        }
    }
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            expiry_hours: default_expiry_hours(),
            public_base_url: default_public_base_url(),
        }
    }
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            bucket: None,
            access_token: None,
            public_base_url: None,
            max_attempts: default_max_attempts(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    64 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_upload_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_sample_rate() -> u32 {
    44_100
}

fn default_channels() -> u16 {
    2
}

fn default_bit_depth() -> u16 {
    16
}

fn default_true() -> bool {
    true
}

fn default_placeholder_seconds() -> f32 {
    5.0
}

fn default_system_binary() -> String {
    "ffmpeg".to_string()
}

fn default_bundled_binary() -> String {
    "bin/ffmpeg".to_string()
}

fn default_ffmpeg_timeout_secs() -> u64 {
    120
}

fn default_root_dir() -> String {
    "tmp".to_string()
}

fn default_retention_hours() -> u64 {
    24
}

fn default_expiry_hours() -> u64 {
    24
}

fn default_purge_interval_secs() -> u64 {
    900
}

fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_attempt_timeout_secs() -> u64 {
    120
}

fn default_initial_backoff_ms() -> u64 {
    500
}
