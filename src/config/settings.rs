//! Application settings and configuration management

use crate::error::{AppError, Result};
use crate::languages::{LanguageCatalog, LanguagePair};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/translator.yaml";

/// Prefix for environment overrides, e.g. `TRANSLATOR__SERVER__PORT=9000`
pub const ENV_PREFIX: &str = "TRANSLATOR";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
    pub translation: TranslationConfig,
    #[serde(default)]
    pub remote: RemoteEngineConfig,
    #[serde(default)]
    pub local: LocalEngineConfig,
    #[serde(default = "default_language_pairs")]
    pub language_pairs: Vec<LanguagePairConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Page assets, relative paths resolve against the working directory
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_request_timeout() -> u64 {
    300
}

fn default_static_dir() -> String {
    "static".to_string()
}

fn default_true() -> bool {
    true
}

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_rps")]
    pub requests_per_second: u32,
    #[serde(default = "default_burst")]
    pub burst_size: u32,
}

fn default_rps() -> u32 {
    20
}

fn default_burst() -> u32 {
    40
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Which engine runs the models
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Hosted inference endpoint (Hugging Face Inference compatible)
    #[default]
    Remote,
    /// In-process candle Marian models, requires the `local` feature
    Local,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Remote => write!(f, "remote"),
            EngineKind::Local => write!(f, "local"),
        }
    }
}

/// Translation behavior
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranslationConfig {
    #[serde(default)]
    pub engine: EngineKind,
    /// Upper bound on generated sequence length, in tokens
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    #[serde(default = "default_source")]
    pub default_source: String,
    #[serde(default = "default_target")]
    pub default_target: String,
    /// Pairs loaded into the cache at startup
    #[serde(default)]
    pub preload: Vec<String>,
}

fn default_max_length() -> usize {
    512
}

fn default_max_input_chars() -> usize {
    5000
}

fn default_source() -> String {
    "en".to_string()
}

fn default_target() -> String {
    "fr".to_string()
}

/// Authentication used when calling the remote inference endpoint
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct EngineAuth {
    #[serde(default)]
    pub token_env: Option<String>,
    #[serde(default)]
    pub header_name: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Remote inference endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteEngineConfig {
    #[serde(default = "default_remote_endpoints")]
    pub endpoints: Vec<String>,
    #[serde(default = "default_remote_auth")]
    pub auth: EngineAuth,
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    #[serde(default = "default_health_check_path")]
    pub health_check_path: String,
    /// Background endpoint probing period, 0 disables it
    #[serde(default)]
    pub health_check_interval_secs: u64,
    /// Ask the endpoint to block until a cold model is loaded
    #[serde(default = "default_true")]
    pub wait_for_model: bool,
}

fn default_remote_endpoints() -> Vec<String> {
    vec!["https://router.huggingface.co/hf-inference".to_string()]
}

fn default_remote_auth() -> EngineAuth {
    EngineAuth {
        token_env: Some("HF_TOKEN".to_string()),
        ..Default::default()
    }
}

fn default_timeout() -> u64 {
    120000
}

fn default_health_check_path() -> String {
    "/health".to_string()
}

impl Default for RemoteEngineConfig {
    fn default() -> Self {
        Self {
            endpoints: default_remote_endpoints(),
            auth: default_remote_auth(),
            timeout_ms: default_timeout(),
            health_check_path: default_health_check_path(),
            health_check_interval_secs: 0,
            wait_for_model: true,
        }
    }
}

/// In-process engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocalEngineConfig {
    /// `cpu` or `cuda`
    #[serde(default = "default_device")]
    pub device: String,
    /// Overrides the Hugging Face cache directory
    #[serde(default)]
    pub cache_dir: Option<String>,
}

fn default_device() -> String {
    "cpu".to_string()
}

impl Default for LocalEngineConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            cache_dir: None,
        }
    }
}

/// A language pair and the pretrained model serving it
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LanguagePairConfig {
    /// Pair key, e.g. `en-fr`
    pub pair: String,
    /// Model repository id, e.g. `Helsinki-NLP/opus-mt-en-fr`
    pub model: String,
    // Local engine only: revision, weights file and the tokenizer.json files with their repo
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer_repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_tokenizer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_tokenizer: Option<String>,
}

impl LanguagePairConfig {
    pub fn new(pair: &str, model: &str) -> Self {
        Self {
            pair: pair.to_string(),
            model: model.to_string(),
            revision: None,
            weights: None,
            tokenizer_repo: None,
            source_tokenizer: None,
            target_tokenizer: None,
        }
    }
}

/// The OPUS-MT pairs served out of the box
pub fn default_language_pairs() -> Vec<LanguagePairConfig> {
    [
        ("en-fr", "Helsinki-NLP/opus-mt-en-fr"),
        ("fr-en", "Helsinki-NLP/opus-mt-fr-en"),
        ("en-de", "Helsinki-NLP/opus-mt-en-de"),
        ("de-en", "Helsinki-NLP/opus-mt-de-en"),
        ("en-es", "Helsinki-NLP/opus-mt-en-es"),
        ("es-en", "Helsinki-NLP/opus-mt-es-en"),
        ("en-ru", "Helsinki-NLP/opus-mt-en-ru"),
        ("ru-en", "Helsinki-NLP/opus-mt-ru-en"),
    ]
    .into_iter()
    .map(|(pair, model)| LanguagePairConfig::new(pair, model))
    .collect()
}

impl Settings {
    /// Load settings from the default configuration file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load settings from a specific configuration file (YAML or TOML)
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Determine file format
        let format = if path
            .extension()
            .map_or(false, |ext| ext == "yaml" || ext == "yml")
        {
            FileFormat::Yaml
        } else {
            FileFormat::Toml
        };

        let mut builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("server.request_timeout_secs", default_request_timeout() as i64)?
            .set_default("server.static_dir", default_static_dir())?
            .set_default("rate_limit.enabled", true)?
            .set_default("rate_limit.requests_per_second", default_rps() as i64)?
            .set_default("rate_limit.burst_size", default_burst() as i64)?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", default_log_format())?
            .set_default("translation.engine", "remote")?
            .set_default("translation.max_length", default_max_length() as i64)?
            .set_default("translation.max_input_chars", default_max_input_chars() as i64)?
            .set_default("translation.default_source", default_source())?
            .set_default("translation.default_target", default_target())?;

        if path.exists() {
            builder = builder.add_source(File::from(path).format(format));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(config_error("Server port cannot be 0"));
        }

        if self.translation.max_length == 0 {
            return Err(config_error("translation.max_length must be positive"));
        }

        if self.translation.max_input_chars == 0 {
            return Err(config_error("translation.max_input_chars must be positive"));
        }

        if self.rate_limit.enabled
            && (self.rate_limit.requests_per_second == 0 || self.rate_limit.burst_size == 0)
        {
            return Err(config_error(
                "Rate limit requests_per_second and burst_size must be positive",
            ));
        }

        if self.translation.engine == EngineKind::Remote && self.remote.endpoints.is_empty() {
            return Err(config_error(
                "Remote engine must have at least one endpoint",
            ));
        }

        if self.translation.engine == EngineKind::Local {
            if let Some(pair) = self
                .language_pairs
                .iter()
                .find(|p| p.source_tokenizer.is_none() || p.target_tokenizer.is_none())
            {
                return Err(config_error(&format!(
                    "Language pair '{}' needs source_tokenizer and target_tokenizer for the local engine; \
                     OPUS-MT repositories ship SentencePiece models, not tokenizer.json",
                    pair.pair
                )));
            }
        }

        let catalog = LanguageCatalog::from_config(&self.language_pairs)?;
        if catalog.is_empty() {
            return Err(config_error("At least one language pair must be configured"));
        }

        for pair in &self.translation.preload {
            let parsed = pair.parse::<LanguagePair>().map_err(|_| {
                config_error(&format!("Invalid preload language pair '{}'", pair))
            })?;
            if !catalog.contains(&parsed) {
                return Err(config_error(&format!(
                    "Preload language pair '{}' is not configured",
                    pair
                )));
            }
        }

        Ok(())
    }

    /// Write the current settings as YAML, useful for bootstrapping a config file
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| config_error(&format!("Failed to serialize settings: {}", e)))
    }
}

fn config_error(message: &str) -> AppError {
    AppError::Config(config::ConfigError::Message(message.to_string()))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
                static_dir: default_static_dir(),
            },
            rate_limit: RateLimitConfig {
                enabled: true,
                requests_per_second: default_rps(),
                burst_size: default_burst(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            },
            translation: TranslationConfig {
                engine: EngineKind::default(),
                max_length: default_max_length(),
                max_input_chars: default_max_input_chars(),
                default_source: default_source(),
                default_target: default_target(),
                preload: vec![],
            },
            remote: RemoteEngineConfig::default(),
            local: LocalEngineConfig::default(),
            language_pairs: default_language_pairs(),
        }
    }
}
