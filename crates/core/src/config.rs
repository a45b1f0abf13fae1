use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub genai: GenaiConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub poll_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct GenaiConfig {
    pub api_key: SecretString,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub retention_hours: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub bot_token: Option<String>,
    pub genai_api_key: Option<String>,
    pub storage_root: Option<PathBuf>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig { bot_token: String::new().into(), poll_timeout_secs: 30 },
            genai: GenaiConfig {
                api_key: String::new().into(),
                model: "gemini-1.5-flash".to_string(),
                base_url: "https://generativelanguage.googleapis.com".to_string(),
                timeout_secs: 30,
            },
            storage: StorageConfig {
                root: PathBuf::from("temp"),
                retention_hours: 24,
                sweep_interval_secs: 3_600,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

/// Partial shape of `coverbot.toml`. Every field is optional; anything not
/// set falls back to the default and may still be overridden by environment.
#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    telegram: Option<TelegramPatch>,
    genai: Option<GenaiPatch>,
    storage: Option<StoragePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramPatch {
    bot_token: Option<String>,
    poll_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct GenaiPatch {
    api_key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct StoragePatch {
    root: Option<PathBuf>,
    retention_hours: Option<u64>,
    sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = resolve_config_path(options.config_path.as_deref()) {
            config.apply_patch(read_patch(&path)?);
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(telegram) = patch.telegram {
            if let Some(token) = telegram.bot_token {
                self.telegram.bot_token = token.into();
            }
            if let Some(timeout) = telegram.poll_timeout_secs {
                self.telegram.poll_timeout_secs = timeout;
            }
        }
        if let Some(genai) = patch.genai {
            if let Some(key) = genai.api_key {
                self.genai.api_key = key.into();
            }
            if let Some(model) = genai.model {
                self.genai.model = model;
            }
            if let Some(base_url) = genai.base_url {
                self.genai.base_url = base_url;
            }
            if let Some(timeout) = genai.timeout_secs {
                self.genai.timeout_secs = timeout;
            }
        }
        if let Some(storage) = patch.storage {
            if let Some(root) = storage.root {
                self.storage.root = root;
            }
            if let Some(hours) = storage.retention_hours {
                self.storage.retention_hours = hours;
            }
            if let Some(interval) = storage.sweep_interval_secs {
                self.storage.sweep_interval_secs = interval;
            }
        }
        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("COVERBOT_TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = value.into();
        }
        if let Some(value) = read_env("COVERBOT_TELEGRAM_POLL_TIMEOUT_SECS") {
            self.telegram.poll_timeout_secs =
                parse_u64("COVERBOT_TELEGRAM_POLL_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("COVERBOT_GENAI_API_KEY") {
            self.genai.api_key = value.into();
        }
        if let Some(value) = read_env("COVERBOT_GENAI_MODEL") {
            self.genai.model = value;
        }
        if let Some(value) = read_env("COVERBOT_GENAI_BASE_URL") {
            self.genai.base_url = value;
        }
        if let Some(value) = read_env("COVERBOT_GENAI_TIMEOUT_SECS") {
            self.genai.timeout_secs = parse_u64("COVERBOT_GENAI_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("COVERBOT_STORAGE_ROOT") {
            self.storage.root = PathBuf::from(value);
        }
        if let Some(value) = read_env("COVERBOT_STORAGE_RETENTION_HOURS") {
            self.storage.retention_hours = parse_u64("COVERBOT_STORAGE_RETENTION_HOURS", &value)?;
        }
        if let Some(value) = read_env("COVERBOT_STORAGE_SWEEP_INTERVAL_SECS") {
            self.storage.sweep_interval_secs =
                parse_u64("COVERBOT_STORAGE_SWEEP_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("COVERBOT_LOGGING_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("COVERBOT_LOGGING_FORMAT") {
            self.logging.format = value.parse()?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(token) = overrides.bot_token {
            self.telegram.bot_token = token.into();
        }
        if let Some(key) = overrides.genai_api_key {
            self.genai.api_key = key.into();
        }
        if let Some(root) = overrides.storage_root {
            self.storage.root = root;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    /// The two secrets are required at startup; their absence is fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram.bot_token.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "telegram.bot_token is required (set COVERBOT_TELEGRAM_BOT_TOKEN)".to_string(),
            ));
        }
        if self.genai.api_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "genai.api_key is required (set COVERBOT_GENAI_API_KEY)".to_string(),
            ));
        }
        if self.telegram.poll_timeout_secs == 0 || self.telegram.poll_timeout_secs > 300 {
            return Err(ConfigError::Validation(
                "telegram.poll_timeout_secs must be in range 1..=300".to_string(),
            ));
        }
        if self.genai.timeout_secs == 0 || self.genai.timeout_secs > 300 {
            return Err(ConfigError::Validation(
                "genai.timeout_secs must be in range 1..=300".to_string(),
            ));
        }
        if !self.genai.base_url.starts_with("http://") && !self.genai.base_url.starts_with("https://")
        {
            return Err(ConfigError::Validation(
                "genai.base_url must start with http:// or https://".to_string(),
            ));
        }
        if self.storage.sweep_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "storage.sweep_interval_secs must be greater than zero".to_string(),
            ));
        }
        let level = self.logging.level.trim().to_ascii_lowercase();
        match level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(ConfigError::Validation(
                "logging.level must be one of trace|debug|info|warn|error".to_string(),
            )),
        }
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("coverbot.toml"), PathBuf::from("config/coverbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str::<ConfigPatch>(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}
