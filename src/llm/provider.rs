//! Upstream text-generation boundary.

use async_trait::async_trait;

use crate::error::LlmError;

/// An upstream service that turns a prompt into generated text.
///
/// The call may fail with a typed [`LlmError`]; whether a failure is worth
/// retrying is decided by [`FailureClass`], not by the provider.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Model identifier reported to clients.
    fn model(&self) -> &str;

    /// Generate a completion for the prompt.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Retry classification of an upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Temporary overload (rate limit, quota). Safe to retry.
    Transient,
    /// Everything else. Propagate immediately, no retry.
    Permanent,
}

impl FailureClass {
    /// Pure classifier over the failure's type and message. Rate-limit and
    /// quota signals are transient; anything else is permanent.
    pub fn of(error: &LlmError) -> Self {
        match error {
            LlmError::RateLimited { .. } | LlmError::QuotaExceeded { .. } => Self::Transient,
            LlmError::RequestFailed { reason, .. } | LlmError::InvalidResponse { reason, .. } => {
                if is_rate_limit_signal(reason) {
                    Self::Transient
                } else {
                    Self::Permanent
                }
            }
            LlmError::AuthFailed { .. } | LlmError::Http(_) => Self::Permanent,
        }
    }
}

/// Keyword scan for overload signals that arrive as opaque message text
/// rather than a typed status.
fn is_rate_limit_signal(reason: &str) -> bool {
    let lower = reason.to_lowercase();
    ["429", "resource_exhausted", "quota", "rate_limit", "rate limit", "too_many_requests"]
        .iter()
        .any(|signal| lower.contains(signal))
}
