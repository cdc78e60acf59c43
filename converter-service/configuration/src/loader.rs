use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use thiserror::Error;
use toml::{Table, Value};

use crate::ConverterConfig;

/// Environment overrides look like `CONVERTER_SERVICE__SERVER__PORT=9000`.
pub const CONFIG_PREFIX: &str = "CONVERTER_SERVICE";

const DEFAULT_RUN_ENV: &str = "development";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid environment override {key}: {message}")]
    Env { key: String, message: String },

    #[error("configuration does not match the expected shape: {0}")]
    Shape(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Defaults, then `config/default.toml`, then `config/<RUN_ENV>.toml`, then
/// `CONVERTER_SERVICE__*` variables. Missing files are skipped.
pub fn load_config() -> Result<ConverterConfig, ConfigError> {
    let run_env = env::var("RUN_ENV").unwrap_or_else(|_| DEFAULT_RUN_ENV.to_string());
    let config_dir = env::var(format!("{CONFIG_PREFIX}_CONFIG_DIR"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config"));

    load_config_from(&config_dir, &run_env, env::vars())
}

pub fn load_config_from(
    config_dir: &Path,
    run_env: &str,
    vars: impl IntoIterator<Item = (String, String)>,
) -> Result<ConverterConfig, ConfigError> {
    let mut merged = match Value::try_from(ConverterConfig::default()) {
        Ok(Value::Table(table)) => table,
        Ok(_) => {
            return Err(ConfigError::Shape(
                "defaults did not serialize to a table".to_string(),
            ))
        }
        Err(err) => return Err(ConfigError::Shape(err.to_string())),
    };

    for name in ["default".to_string(), run_env.to_string()] {
        let path = config_dir.join(format!("{name}.toml"));
        if let Some(table) = read_table(&path)? {
            merge(&mut merged, table);
        }
    }

    let env_prefix = format!("{CONFIG_PREFIX}__");
    let mut overrides: Vec<(String, String)> = vars
        .into_iter()
        .filter(|(key, _)| key.starts_with(&env_prefix))
        .collect();
    overrides.sort();
    for (key, raw) in overrides {
        let path: Vec<String> = key[env_prefix.len()..]
            .split("__")
            .map(str::to_ascii_lowercase)
            .collect();
        if path.iter().any(String::is_empty) {
            return Err(ConfigError::Env {
                key,
                message: "empty path segment".to_string(),
            });
        }
        set_path(&mut merged, &path, parse_env_value(&raw)).map_err(|message| {
            ConfigError::Env {
                key: key.clone(),
                message,
            }
        })?;
    }

    let config: ConverterConfig = Value::Table(merged)
        .try_into()
        .map_err(|err: toml::de::Error| ConfigError::Shape(err.to_string()))?;
    config.validate()?;

    tracing::debug!(run_env, config_dir = %config_dir.display(), "configuration loaded");
    Ok(config)
}

fn read_table(path: &Path) -> Result<Option<Table>, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    content
        .parse::<Table>()
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

fn merge(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match value {
            Value::Table(incoming) => {
                if let Some(Value::Table(existing)) = base.get_mut(&key) {
                    merge(existing, incoming);
                    continue;
                }
                base.insert(key, Value::Table(incoming));
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}

fn set_path(root: &mut Table, path: &[String], value: Value) -> Result<(), String> {
    let Some((last, parents)) = path.split_last() else {
        return Err("empty key".to_string());
    };

    let mut table = root;
    for segment in parents {
        let entry = table
            .entry(segment.clone())
            .or_insert_with(|| Value::Table(Table::new()));
        table = match entry {
            Value::Table(nested) => nested,
            _ => return Err(format!("`{segment}` is not a section")),
        };
    }
    table.insert(last.clone(), value);
    Ok(())
}

/// TOML scalar when the text parses as one (`8080`, `true`, `2.5`), plain string otherwise.
fn parse_env_value(raw: &str) -> Value {
    format!("value = {raw}")
        .parse::<Table>()
        .ok()
        .and_then(|mut table| table.remove("value"))
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LogFormat, SampleRateModeConfig};

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_without_files_or_env() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(dir.path(), "development", Vec::new()).unwrap();

        assert_eq!(config, ConverterConfig::default());
        assert_eq!(config.server.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.server.max_body_bytes, 64 * 1024 * 1024);
        assert_eq!(config.conversion.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.conversion.default_sample_rate_hz, 44_100);
        assert_eq!(config.conversion.sample_rate_mode, SampleRateModeConfig::Resample);
        assert!(config.conversion.allow_degraded);
        assert_eq!(config.storage.root_dir, "tmp");
        assert_eq!(config.share.expiry_hours, 24);
        assert!(!config.object_storage.enabled);
        assert_eq!(config.object_storage.max_attempts, 3);
    }

    #[test]
    fn run_env_file_overrides_default_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            "[server]\nport = 9000\n\n[logging]\nlevel = \"debug\"\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("production.toml"),
            "[server]\nhost = \"127.0.0.1\"\n\n[logging]\nformat = \"full\"\n\n[conversion]\nsample_rate_mode = \"relabel\"\n",
        )
        .unwrap();

        let config = load_config_from(dir.path(), "production", Vec::new()).unwrap();
        assert_eq!(config.server.bind_address(), "127.0.0.1:9000");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Full);
        assert_eq!(config.conversion.sample_rate_mode, SampleRateModeConfig::Relabel);
        assert_eq!(config.conversion.default_channels, 2);
    }

    #[test]
    fn env_overrides_win_and_parse_scalars() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("default.toml"), "[server]\nport = 9000\n").unwrap();

        let config = load_config_from(
            dir.path(),
            "development",
            vars(&[
                ("CONVERTER_SERVICE__SERVER__PORT", "7000"),
                ("CONVERTER_SERVICE__SERVER__HOST", "127.0.0.1"),
                ("CONVERTER_SERVICE__CONVERSION__ALLOW_DEGRADED", "false"),
                ("CONVERTER_SERVICE__CONVERSION__PLACEHOLDER_SECONDS", "2.5"),
                ("CONVERTER_SERVICE__OBJECT_STORAGE__ENABLED", "true"),
                ("CONVERTER_SERVICE__OBJECT_STORAGE__ENDPOINT", "http://localhost:9000"),
                ("CONVERTER_SERVICE__OBJECT_STORAGE__BUCKET", "audio"),
                ("UNRELATED__SERVER__PORT", "1"),
            ]),
        )
        .unwrap();

        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(!config.conversion.allow_degraded);
        assert_eq!(config.conversion.placeholder_seconds, 2.5);
        assert!(config.object_storage.enabled);
        assert_eq!(
            config.object_storage.endpoint.as_deref(),
            Some("http://localhost:9000")
        );
        assert_eq!(config.object_storage.bucket.as_deref(), Some("audio"));
    }

    #[test]
    fn bad_values_are_reported() {
        let dir = tempfile::tempdir().unwrap();

        let wrong_type = load_config_from(
            dir.path(),
            "development",
            vars(&[("CONVERTER_SERVICE__SERVER__PORT", "not-a-port")]),
        );
        assert!(matches!(wrong_type, Err(ConfigError::Shape(_))));

        let incomplete_bucket = load_config_from(
            dir.path(),
            "development",
            vars(&[("CONVERTER_SERVICE__OBJECT_STORAGE__ENABLED", "true")]),
        );
        assert!(matches!(incomplete_bucket, Err(ConfigError::Invalid(_))));

        fs::write(dir.path().join("default.toml"), "[server\nport = ").unwrap();
        let broken_file = load_config_from(dir.path(), "development", Vec::new());
        assert!(matches!(broken_file, Err(ConfigError::Parse { .. })));
    }
}
