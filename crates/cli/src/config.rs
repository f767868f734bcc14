//! Configuration loading from cryptochat.toml and the environment.

use std::path::Path;
use std::time::Duration;

use mcp::ClientConfig;
use runtime::AnthropicBackend;
use runtime::providers::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
use serde::Deserialize;

/// File read when `--config` is not given. Missing is fine.
pub const CONFIG_FILE: &str = "cryptochat.toml";

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

pub const ENV_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const ENV_SERVER_URL: &str = "CRYPTOCHAT_SERVER_URL";
pub const ENV_MODEL: &str = "CRYPTOCHAT_MODEL";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Tool server connection.
    #[serde(default)]
    pub server: ServerConfig,

    /// Completion backend.
    #[serde(default)]
    pub backend: BackendConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the MCP server; the stream is at `<url>/sse`.
    #[serde(default = "default_server_url")]
    pub url: String,

    /// Send the server's same-named prompt template along with tool calls.
    #[serde(default)]
    pub attach_prompts: bool,

    /// Per-request limit in seconds. Unset waits indefinitely.
    pub timeout_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            attach_prompts: false,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Anthropic API key. `ANTHROPIC_API_KEY` takes precedence.
    pub api_key: Option<String>,

    /// Optional system prompt.
    pub system: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            api_key: None,
            system: None,
        }
    }
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Resolve the configuration for this process.
    ///
    /// An explicit path must exist; the default file is optional.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None if Path::new(CONFIG_FILE).exists() => Self::load(CONFIG_FILE)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override file values with environment variables. Empty values are
    /// treated as unset.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if let Some(key) = var(ENV_API_KEY) {
            self.backend.api_key = Some(key);
        }
        if let Some(url) = var(ENV_SERVER_URL) {
            self.server.url = url;
        }
        if let Some(model) = var(ENV_MODEL) {
            self.backend.model = model;
        }
    }

    /// Connection settings for the tool server.
    pub fn client_config(&self) -> ClientConfig {
        let config = ClientConfig::new(self.server.url.clone());
        match self.server.timeout_secs {
            Some(secs) => config.with_timeout(Duration::from_secs(secs)),
            None => config,
        }
    }

    /// Build the completion backend. Requires an API key.
    pub fn backend(&self) -> Result<AnthropicBackend, ConfigError> {
        let api_key = self
            .backend
            .api_key
            .as_deref()
            .ok_or(ConfigError::MissingApiKey)?;

        let mut builder = AnthropicBackend::builder(api_key)
            .model(&self.backend.model)
            .max_tokens(self.backend.max_tokens);
        if let Some(system) = &self.backend.system {
            builder = builder.system(system);
        }
        Ok(builder.build())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("API key not configured: set {ENV_API_KEY} or backend.api_key")]
    MissingApiKey,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.url, "http://localhost:8000");
        assert!(!config.server.attach_prompts);
        assert_eq!(config.server.timeout_secs, None);
        assert_eq!(config.backend.model, "claude-3-7-sonnet-20250219");
        assert_eq!(config.backend.max_tokens, 1000);
        assert!(config.backend.api_key.is_none());
    }

    #[test]
    fn parses_both_sections() {
        let config = Config::parse(
            r#"
            [server]
            url = "http://crypto.internal:9000"
            attach_prompts = true
            timeout_secs = 30

            [backend]
            model = "claude-3-5-haiku-20241022"
            max_tokens = 512
            system = "Answer in one sentence."
            "#,
        )
        .unwrap();

        assert_eq!(config.server.url, "http://crypto.internal:9000");
        assert!(config.server.attach_prompts);
        assert_eq!(config.backend.model, "claude-3-5-haiku-20241022");
        assert_eq!(config.backend.max_tokens, 512);
        assert_eq!(config.backend.system.as_deref(), Some("Answer in one sentence."));

        let client = config.client_config();
        assert_eq!(client.url, "http://crypto.internal:9000");
        assert_eq!(client.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn environment_overrides_file() {
        let mut config = Config::parse(
            r#"
            [server]
            url = "http://from-file:8000"
            [backend]
            model = "from-file"
            api_key = "file-key"
            "#,
        )
        .unwrap();

        config.apply_env(env(&[
            (ENV_SERVER_URL, "http://from-env:8000"),
            (ENV_MODEL, "from-env"),
            (ENV_API_KEY, "env-key"),
        ]));

        assert_eq!(config.server.url, "http://from-env:8000");
        assert_eq!(config.backend.model, "from-env");
        assert_eq!(config.backend.api_key.as_deref(), Some("env-key"));
    }

    #[test]
    fn empty_environment_values_are_ignored() {
        let mut config = Config::default();
        config.apply_env(env(&[(ENV_SERVER_URL, ""), (ENV_API_KEY, "")]));

        assert_eq!(config.server.url, DEFAULT_SERVER_URL);
        assert!(config.backend.api_key.is_none());
    }

    #[test]
    fn backend_requires_api_key() {
        let config = Config::default();
        assert!(matches!(config.backend(), Err(ConfigError::MissingApiKey)));

        let mut config = Config::default();
        config.backend.api_key = Some("sk-ant-test".into());
        let backend = config.backend().unwrap();
        assert_eq!(backend.model(), DEFAULT_MODEL);
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let err = Config::parse("[server\nurl = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = Config::resolve(Some(Path::new("/nonexistent/cryptochat.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
