//! Configuration for Wellspring.
//!
//! Everything is env-driven with sensible defaults; a `.env` file is loaded
//! if present. The only required variable is `GEMINI_API_KEY`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Main configuration for the service.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub history: HistoryConfig,
    pub retry: RetryConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            server: ServerConfig::from_env()?,
            llm: LlmConfig::from_env()?,
            history: HistoryConfig::from_env()?,
            retry: RetryConfig::from_env()?,
        })
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

impl ServerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let bind = optional_env("SERVER_BIND")?
            .map(|s| s.parse())
            .transpose()
            .map_err(|e| ConfigError::InvalidValue {
                key: "SERVER_BIND".to_string(),
                message: format!("must be a socket address like 127.0.0.1:8000: {e}"),
            })?
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8000)));
        Ok(Self { bind })
    }
}

/// Upstream text-generation provider configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API key for the Gemini API.
    pub api_key: SecretString,
    /// Model name, e.g. `gemini-2.5-flash`.
    pub model: String,
    /// Base URL of the generateContent endpoint family.
    pub base_url: String,
}

impl LlmConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let api_key = optional_env("GEMINI_API_KEY")?
            .ok_or_else(|| ConfigError::MissingEnvVar("GEMINI_API_KEY".to_string()))?;

        Ok(Self {
            api_key: SecretString::from(api_key),
            model: optional_env("GEMINI_MODEL")?.unwrap_or_else(|| "gemini-2.5-flash".to_string()),
            base_url: optional_env("GEMINI_BASE_URL")?.unwrap_or_else(|| {
                "https://generativelanguage.googleapis.com/v1beta".to_string()
            }),
        })
    }
}

/// Conversation history bounds and persistence paths.
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Maximum number of users held in memory.
    pub max_users: usize,
    /// Maximum retained messages per user.
    pub max_messages_per_user: usize,
    /// Messages handed to the prompt builder as context.
    pub context_messages: usize,
    /// Age beyond which messages are swept at startup.
    pub retention: Duration,
    /// Path of the JSON snapshot file.
    pub snapshot_path: PathBuf,
    /// Snapshot size above which a warning is logged. Informational only.
    pub max_file_bytes: u64,
}

impl HistoryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            max_users: parse_optional_env("HISTORY_MAX_USERS", 1000)?,
            max_messages_per_user: parse_optional_env("HISTORY_MAX_MESSAGES_PER_USER", 30)?,
            context_messages: parse_optional_env("HISTORY_CONTEXT_MESSAGES", 6)?,
            retention: Duration::from_secs(
                parse_optional_env("HISTORY_RETENTION_DAYS", 30u64)? * 24 * 60 * 60,
            ),
            snapshot_path: optional_env("HISTORY_SNAPSHOT_PATH")?
                .map(PathBuf::from)
                .unwrap_or_else(default_snapshot_path),
            max_file_bytes: parse_optional_env("HISTORY_MAX_FILE_MB", 100u64)? * 1024 * 1024,
        })
    }
}

/// Retry and backoff settings for upstream calls.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum attempts per upstream call.
    pub max_retries: u32,
    /// First backoff delay; doubles on each transient failure.
    pub base_delay: Duration,
    /// Hard cap on any single backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            max_retries: parse_optional_env("RETRY_MAX_ATTEMPTS", 3)?,
            base_delay: Duration::from_millis(parse_optional_env("RETRY_BASE_DELAY_MS", 1000u64)?),
            max_delay: Duration::from_millis(parse_optional_env("RETRY_MAX_DELAY_MS", 10_000u64)?),
        })
    }
}

/// Default snapshot location: `~/.wellspring/chat_history.json`.
pub fn default_snapshot_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".wellspring")
        .join("chat_history.json")
}

pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(val) if val.is_empty() => Ok(None),
        Ok(val) => Ok(Some(val)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::ParseError(format!(
            "failed to read {key}: {e}"
        ))),
    }
}

pub(crate) fn parse_optional_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    optional_env(key)?
        .map(|s| {
            s.parse().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{e}"),
            })
        })
        .transpose()
        .map(|opt| opt.unwrap_or(default))
}
