//! Persistent configuration loaded from `config.toml` in the platform
//! config directory. A missing file yields the defaults; a malformed file
//! is an error rather than a silent fallback.

use std::fmt;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:3000";
pub const DEFAULT_PROVIDER_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct ProviderConfig {
    /// Base URL of the OpenAI-compatible API the relay forwards to.
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key.
    pub api_key_env: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Config {
    /// Base URL of the relay endpoint the chat panels post to.
    pub endpoint: Option<String>,
    /// Model ids to open panels for when none are given on the command line.
    #[serde(default)]
    pub default_models: Vec<String>,
    /// Share one input box across all panels.
    pub linked_inputs: Option<bool>,
    /// UI theme name ("dark" or "light").
    pub theme: Option<String>,
    /// Enable markdown rendering in the chat area.
    pub markdown: Option<bool>,
    /// Enable syntax highlighting for fenced code blocks.
    pub syntax: Option<bool>,
    #[serde(default)]
    pub provider: ProviderConfig,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "cannot read {}: {e}", path.display()),
            ConfigError::Parse(path, e) => write!(f, "cannot parse {}: {e}", path.display()),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from_path(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }

    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "permacommons", "chorus")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn endpoint_or_default(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
    }

    pub fn provider_base_url(&self) -> String {
        self.provider
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_PROVIDER_BASE_URL.to_string())
    }

    pub fn api_key_env(&self) -> String {
        self.provider
            .api_key_env
            .clone()
            .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string())
    }

    pub fn linked_inputs_or_default(&self) -> bool {
        self.linked_inputs.unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::default();
        assert_eq!(config.endpoint_or_default(), DEFAULT_ENDPOINT);
        assert_eq!(config.provider_base_url(), DEFAULT_PROVIDER_BASE_URL);
        assert_eq!(config.api_key_env(), DEFAULT_API_KEY_ENV);
        assert!(config.linked_inputs_or_default());
        assert!(config.default_models.is_empty());
    }

    #[test]
    fn config_file_round_trips() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
endpoint = "http://localhost:8080"
default_models = ["openai/gpt-4o", "google/gemini-2.5-flash"]
linked_inputs = false

[provider]
base_url = "https://example.test/v1"
api_key_env = "EXAMPLE_KEY"
"#
        )
        .unwrap();

        let config = Config::load_from_path(file.path()).unwrap();
        assert_eq!(config.endpoint_or_default(), "http://localhost:8080");
        assert_eq!(config.default_models.len(), 2);
        assert!(!config.linked_inputs_or_default());
        assert_eq!(config.provider_base_url(), "https://example.test/v1");
        assert_eq!(config.api_key_env(), "EXAMPLE_KEY");
    }

    #[test]
    fn malformed_config_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "endpoint = [not toml").unwrap();
        assert!(matches!(
            Config::load_from_path(file.path()),
            Err(ConfigError::Parse(_, _))
        ));
    }
}
