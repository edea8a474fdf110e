//! Error types for Wellspring.

use std::time::Duration;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// History store errors.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("No conversation history for user {user}")]
    UserNotFound { user: String },
}

/// Snapshot persistence errors.
///
/// These are always logged and swallowed by callers: losing a single
/// persistence write must not crash the service, and the in-memory store
/// stays authoritative until the next successful save.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Upstream LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Provider {provider} quota exhausted")]
    QuotaExceeded { provider: String },

    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors surfaced to the request-handling layer.
///
/// Only upstream-call failures reach callers; storage and persistence
/// failures degrade gracefully and are observable only via logs.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The provider stayed rate limited through every retry. Distinct from
    /// the raw provider error so callers can present a generic busy message
    /// instead of leaking upstream detail.
    #[error("AI service is busy, please try again in a moment")]
    UpstreamBusy,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Upstream call failed: {0}")]
    Upstream(#[from] LlmError),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::MissingEnvVar("GEMINI_API_KEY".to_string());
        let msg = err.to_string();
        assert!(
            msg.contains("GEMINI_API_KEY"),
            "Should mention the variable name: {msg}"
        );

        let err = ConfigError::InvalidValue {
            key: "SERVER_PORT".to_string(),
            message: "must be a number".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("SERVER_PORT"), "Should mention the key: {msg}");
    }

    #[test]
    fn history_error_display() {
        let err = HistoryError::UserNotFound {
            user: "alice".to_string(),
        };
        assert!(err.to_string().contains("alice"));
    }

    #[test]
    fn llm_error_display() {
        let err = LlmError::RateLimited {
            provider: "gemini".to_string(),
            retry_after: Some(Duration::from_secs(30)),
        };
        let msg = err.to_string();
        assert!(msg.contains("gemini"), "Should mention provider: {msg}");

        let err = LlmError::QuotaExceeded {
            provider: "gemini".to_string(),
        };
        assert!(err.to_string().contains("quota"));
    }

    #[test]
    fn chat_error_busy_is_generic() {
        let msg = ChatError::UpstreamBusy.to_string();
        assert!(msg.contains("busy"), "Busy message should be generic: {msg}");
        assert!(
            !msg.contains("rate"),
            "Busy message must not leak upstream detail: {msg}"
        );
    }

    #[test]
    fn top_level_error_from_conversions() {
        let config_err = ConfigError::MissingEnvVar("TEST".to_string());
        let err: Error = config_err.into();
        assert!(matches!(err, Error::Config(_)));

        let hist_err = HistoryError::UserNotFound {
            user: "bob".to_string(),
        };
        let err: Error = hist_err.into();
        assert!(matches!(err, Error::History(_)));

        let chat_err = ChatError::UpstreamBusy;
        let err: Error = chat_err.into();
        assert!(matches!(err, Error::Chat(_)));
    }
}
