use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory unless `GPT_FTL_CONFIG` is set
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
pub const DEFAULT_OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Raw settings as they appear in `config.toml`. Every field is optional so
/// that missing keys can be reported together.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    openai_api_key: Option<String>,
    base_lang: Option<String>,
    model: Option<String>,
    ftl_root_path: Option<String>,
    openai_api_url: Option<String>,
    max_concurrency: Option<usize>,
    request_timeout_secs: Option<u64>,
    temperature: Option<f32>,
}

/// Validated, read-only settings shared by every translation task.
#[derive(Debug, Clone)]
pub struct Config {
    // OpenAI
    pub openai_api_key: String,
    pub model: String,
    pub openai_api_url: String,
    pub temperature: f32,
    pub request_timeout_secs: u64,

    // Project
    pub base_lang: String,
    pub ftl_root_path: PathBuf,

    /// Upper bound on in-flight tasks; `None` launches every task at once
    pub max_concurrency: Option<usize>,
}

impl Config {
    /// Build a config with defaults for every optional setting
    pub fn new(
        openai_api_key: impl Into<String>,
        base_lang: impl Into<String>,
        model: impl Into<String>,
        ftl_root_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            openai_api_key: openai_api_key.into(),
            model: model.into(),
            openai_api_url: DEFAULT_OPENAI_API_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            base_lang: base_lang.into(),
            ftl_root_path: ftl_root_path.into(),
            max_concurrency: None,
        }
    }

    /// Load from the default location (`$GPT_FTL_CONFIG` or `config.toml`)
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("GPT_FTL_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from_path(Path::new(&path))
    }

    /// Load from a TOML file, applying environment overrides.
    ///
    /// A missing file is fine as long as the environment provides every
    /// required setting.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let file = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Invalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            toml::from_str(&content).map_err(|e| ConfigError::Invalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        } else {
            FileConfig::default()
        };

        Self::from_parts(file, |name| std::env::var(name).ok())
    }

    /// Parse TOML text directly, without environment overrides
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(content).map_err(|e| ConfigError::Invalid {
            path: PathBuf::from(DEFAULT_CONFIG_FILE),
            reason: e.to_string(),
        })?;
        Self::from_parts(file, |_| None)
    }

    fn from_parts(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let pick = |env_name: &str, file_value: Option<String>| {
            env(env_name)
                .or(file_value)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let config = Self {
            openai_api_key: pick("OPENAI_API_KEY", file.openai_api_key).unwrap_or_default(),
            model: pick("GPT_FTL_MODEL", file.model).unwrap_or_default(),
            openai_api_url: file
                .openai_api_url
                .unwrap_or_else(|| DEFAULT_OPENAI_API_URL.to_string()),
            temperature: file.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            request_timeout_secs: file
                .request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            base_lang: pick("GPT_FTL_BASE_LANG", file.base_lang).unwrap_or_default(),
            ftl_root_path: pick("GPT_FTL_ROOT_PATH", file.ftl_root_path)
                .map(PathBuf::from)
                .unwrap_or_default(),
            max_concurrency: file.max_concurrency.filter(|n| *n > 0),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check that every required setting is present
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if self.openai_api_key.trim().is_empty() {
            missing.push("openai_api_key");
        }
        if self.base_lang.trim().is_empty() {
            missing.push("base_lang");
        }
        if self.model.trim().is_empty() {
            missing.push("model");
        }
        if self.ftl_root_path.as_os_str().is_empty() {
            missing.push("ftl_root_path");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Missing(missing))
        }
    }
}
