//! Configuration management for Polyglot Messenger
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//! Later sources win: file, then `POLYGLOT_*` environment variables, then
//! command-line flags.

use crate::chat::naming::NamingConfig;
use crate::error::{PolyglotError, Result};
use crate::locale::Language;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for Polyglot Messenger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Display language
    #[serde(default)]
    pub locale: LocaleConfig,

    /// Conversation naming
    #[serde(default)]
    pub naming: NamingConfig,

    /// How the session reaches an assistant
    #[serde(default)]
    pub transport: TransportConfig,

    /// In-process assistant backed by a chat completions endpoint
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Logging output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Display language configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocaleConfig {
    /// Initial display language code (`en`, `zh`, `ur`)
    #[serde(default)]
    pub language: Language,
}

/// Which transport carries requests to the assistant
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// No assistant; user turns are only stored
    Offline,
    /// Built-in assistant calling a chat completions endpoint
    #[default]
    Assistant,
    /// External bridge process speaking the protocol on stdin/stdout
    Bridge,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Offline => write!(f, "offline"),
            Self::Assistant => write!(f, "assistant"),
            Self::Bridge => write!(f, "bridge"),
        }
    }
}

/// Transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Transport to use
    #[serde(default)]
    pub kind: TransportKind,

    /// Seconds a request may stay unanswered before a timeout error is
    /// shown; `0` disables the timeout
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// Bridge process settings, used when `kind` is `bridge`
    #[serde(default)]
    pub bridge: BridgeConfig,
}

fn default_request_timeout_seconds() -> u64 {
    60
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            request_timeout_seconds: default_request_timeout_seconds(),
            bridge: BridgeConfig::default(),
        }
    }
}

/// Bridge process configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Executable to spawn
    #[serde(default)]
    pub command: Option<PathBuf>,

    /// Arguments passed to the executable
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment variables for the bridge
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Built-in assistant configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Base URL of the OpenAI-compatible API (`/chat/completions` is appended)
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Model name sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// System prompt sent before the user turn
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Upper bound on reply length, in tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// HTTP timeout for one completion request, in seconds
    #[serde(default = "default_http_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_system_prompt() -> String {
    "You are AMIK AI Assistant, a helpful and knowledgeable AI.".to_string()
}

fn default_max_tokens() -> u32 {
    500
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_http_timeout_seconds() -> u64 {
    120
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            model: default_model(),
            system_prompt: default_system_prompt(),
            max_tokens: default_max_tokens(),
            api_key_env: default_api_key_env(),
            timeout_seconds: default_http_timeout_seconds(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON-formatted log lines
    #[serde(default)]
    pub json_format: bool,

    /// Also write logs to this file
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error; defaults are used instead.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns [`PolyglotError::Config`] if the file exists but cannot be
    /// read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::debug!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| PolyglotError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| PolyglotError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(code) = std::env::var("POLYGLOT_LANGUAGE") {
            match Language::from_code(&code) {
                Ok(language) => self.locale.language = language,
                Err(_) => tracing::warn!("Invalid POLYGLOT_LANGUAGE: {}", code),
            }
        }

        if let Ok(kind) = std::env::var("POLYGLOT_TRANSPORT") {
            match <TransportKind as clap::ValueEnum>::from_str(&kind, true) {
                Ok(kind) => self.transport.kind = kind,
                Err(_) => tracing::warn!("Invalid POLYGLOT_TRANSPORT: {}", kind),
            }
        }

        if let Ok(timeout) = std::env::var("POLYGLOT_REQUEST_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.transport.request_timeout_seconds = value;
            } else {
                tracing::warn!("Invalid POLYGLOT_REQUEST_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(command) = std::env::var("POLYGLOT_BRIDGE_COMMAND") {
            self.transport.bridge.command = Some(PathBuf::from(command));
        }

        if let Ok(api_base) = std::env::var("POLYGLOT_API_BASE") {
            self.assistant.api_base = api_base;
        }

        if let Ok(model) = std::env::var("POLYGLOT_MODEL") {
            self.assistant.model = model;
        }

        if let Ok(max_tokens) = std::env::var("POLYGLOT_MAX_TOKENS") {
            if let Ok(value) = max_tokens.parse() {
                self.assistant.max_tokens = value;
            } else {
                tracing::warn!("Invalid POLYGLOT_MAX_TOKENS: {}", max_tokens);
            }
        }

        if let Ok(level) = std::env::var("POLYGLOT_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(json) = std::env::var("POLYGLOT_LOG_JSON") {
            self.logging.json_format = matches!(json.as_str(), "1" | "true" | "yes");
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            self.logging.level = "debug".to_string();
        }

        if let crate::cli::Commands::Chat {
            language,
            transport,
        } = &cli.command
        {
            if let Some(language) = language {
                self.locale.language = *language;
            }
            if let Some(kind) = transport {
                self.transport.kind = *kind;
            }
        }
    }

    /// Request timeout for the chat session, `None` when disabled
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.transport.request_timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`PolyglotError::Config`] naming the first invalid setting
    pub fn validate(&self) -> Result<()> {
        if self.naming.max_words == 0 {
            return Err(
                PolyglotError::Config("naming.max_words must be greater than 0".to_string())
                    .into(),
            );
        }

        if self.transport.kind == TransportKind::Bridge
            && self
                .transport
                .bridge
                .command
                .as_ref()
                .map_or(true, |c| c.as_os_str().is_empty())
        {
            return Err(PolyglotError::Config(
                "transport.bridge.command is required for the bridge transport".to_string(),
            )
            .into());
        }

        if self.transport.kind == TransportKind::Assistant {
            let base = self.assistant.api_base.as_str();
            if !(base.starts_with("http://") || base.starts_with("https://")) {
                return Err(PolyglotError::Config(format!(
                    "assistant.api_base must be an http(s) URL, got '{}'",
                    base
                ))
                .into());
            }

            if self.assistant.model.trim().is_empty() {
                return Err(
                    PolyglotError::Config("assistant.model cannot be empty".to_string()).into(),
                );
            }

            if self.assistant.max_tokens == 0 {
                return Err(PolyglotError::Config(
                    "assistant.max_tokens must be greater than 0".to_string(),
                )
                .into());
            }

            if self.assistant.timeout_seconds == 0 {
                return Err(PolyglotError::Config(
                    "assistant.timeout_seconds must be greater than 0".to_string(),
                )
                .into());
            }
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(PolyglotError::Config(format!(
                "Invalid logging.level: {}. Must be one of: {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            ))
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use serial_test::serial;

    const ENV_VARS: [&str; 9] = [
        "POLYGLOT_LANGUAGE",
        "POLYGLOT_TRANSPORT",
        "POLYGLOT_REQUEST_TIMEOUT_SECONDS",
        "POLYGLOT_BRIDGE_COMMAND",
        "POLYGLOT_API_BASE",
        "POLYGLOT_MODEL",
        "POLYGLOT_MAX_TOKENS",
        "POLYGLOT_LOG_LEVEL",
        "POLYGLOT_LOG_JSON",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    fn chat_cli(language: Option<Language>, transport: Option<TransportKind>) -> Cli {
        Cli {
            config: None,
            verbose: false,
            command: Commands::Chat {
                language,
                transport,
            },
        }
    }

    fn config_error(config: &Config) -> String {
        let err = config.validate().unwrap_err();
        match err.downcast_ref::<PolyglotError>() {
            Some(PolyglotError::Config(msg)) => msg.clone(),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.locale.language, Language::English);
        assert_eq!(config.naming.max_words, 3);
        assert_eq!(config.transport.kind, TransportKind::Assistant);
        assert_eq!(config.transport.request_timeout_seconds, 60);
        assert_eq!(config.assistant.model, "gpt-3.5-turbo");
        assert_eq!(config.assistant.max_tokens, 500);
        assert_eq!(config.assistant.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
locale:
  language: ur
naming:
  max_words: 5
transport:
  kind: bridge
  request_timeout_seconds: 0
  bridge:
    command: /usr/local/bin/ws-bridge
    args: ["ws://localhost:5000"]
logging:
  json_format: true
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.locale.language, Language::Urdu);
        assert_eq!(config.naming.max_words, 5);
        assert_eq!(config.naming.ellipsis, "...");
        assert_eq!(config.transport.kind, TransportKind::Bridge);
        assert_eq!(config.request_timeout(), None);
        assert_eq!(
            config.transport.bridge.command,
            Some(PathBuf::from("/usr/local/bin/ws-bridge"))
        );
        assert_eq!(config.transport.bridge.args, vec!["ws://localhost:5000"]);
        assert!(config.logging.json_format);
        assert_eq!(config.assistant.model, "gpt-3.5-turbo");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_unknown_language_in_yaml_is_rejected() {
        let result: std::result::Result<Config, _> =
            serde_yaml::from_str("locale:\n  language: fr\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_zero_max_words() {
        let mut config = Config::default();
        config.naming.max_words = 0;
        assert!(config_error(&config).contains("max_words"));
    }

    #[test]
    fn test_validation_bridge_requires_command() {
        let mut config = Config::default();
        config.transport.kind = TransportKind::Bridge;
        assert!(config_error(&config).contains("bridge.command"));

        config.transport.bridge.command = Some(PathBuf::from("bridge"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_assistant_settings() {
        let mut config = Config::default();
        config.assistant.api_base = "ftp://example.com".to_string();
        assert!(config_error(&config).contains("api_base"));

        let mut config = Config::default();
        config.assistant.max_tokens = 0;
        assert!(config_error(&config).contains("max_tokens"));

        let mut config = Config::default();
        config.assistant.model = "  ".to_string();
        assert!(config_error(&config).contains("model"));
    }

    #[test]
    fn test_offline_skips_assistant_checks() {
        let mut config = Config::default();
        config.transport.kind = TransportKind::Offline;
        config.assistant.api_base = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config_error(&config).contains("logging.level"));
    }

    #[test]
    #[serial]
    fn test_load_nonexistent_file_uses_defaults() {
        clear_env();
        let config = Config::load("nonexistent.yaml", &chat_cli(None, None)).unwrap();
        assert_eq!(config.locale.language, Language::English);
        assert_eq!(config.transport.kind, TransportKind::Assistant);
    }

    #[test]
    #[serial]
    fn test_load_invalid_yaml_is_config_error() {
        clear_env();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "locale: [unclosed").unwrap();

        let err = Config::load(path.to_str().unwrap(), &chat_cli(None, None)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PolyglotError>(),
            Some(PolyglotError::Config(_))
        ));
    }

    #[test]
    #[serial]
    fn test_env_vars_override_file() {
        clear_env();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "locale:\n  language: en\nassistant:\n  model: a\n").unwrap();

        std::env::set_var("POLYGLOT_LANGUAGE", "ZH");
        std::env::set_var("POLYGLOT_TRANSPORT", "offline");
        std::env::set_var("POLYGLOT_MODEL", "gpt-4o-mini");
        std::env::set_var("POLYGLOT_REQUEST_TIMEOUT_SECONDS", "15");
        std::env::set_var("POLYGLOT_MAX_TOKENS", "not-a-number");

        let config = Config::load(path.to_str().unwrap(), &chat_cli(None, None)).unwrap();
        clear_env();

        assert_eq!(config.locale.language, Language::Chinese);
        assert_eq!(config.transport.kind, TransportKind::Offline);
        assert_eq!(config.assistant.model, "gpt-4o-mini");
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(15)));
        assert_eq!(config.assistant.max_tokens, 500);
    }

    #[test]
    #[serial]
    fn test_cli_overrides_env() {
        clear_env();
        std::env::set_var("POLYGLOT_LANGUAGE", "zh");

        let mut cli = chat_cli(Some(Language::Urdu), Some(TransportKind::Offline));
        cli.verbose = true;
        let config = Config::load("nonexistent.yaml", &cli).unwrap();
        clear_env();

        assert_eq!(config.locale.language, Language::Urdu);
        assert_eq!(config.transport.kind, TransportKind::Offline);
        assert_eq!(config.logging.level, "debug");
    }
}
