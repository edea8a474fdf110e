//! Bounded retry with full-jitter capped exponential backoff.
//!
//! Wraps one upstream call. Permanent failures propagate on first
//! occurrence; transient failures back off and retry. When the final
//! attempt is still transient the caller gets [`ChatError::UpstreamBusy`]
//! instead of the raw provider error.
//!
//! The loop holds no locks and keeps no state outside its locals, so an
//! external timeout or cancellation simply drops the future mid-sleep and
//! no further attempts are made.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;
use crate::error::{ChatError, LlmError};
use crate::llm::provider::FailureClass;

/// Delay before retry `attempt` (0-based): `base * 2^attempt` plus up to
/// one second of uniform jitter, capped at `max_delay`.
fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let base_ms = config.base_delay.as_millis() as u64;
    let exp_ms = base_ms.saturating_mul(2u64.saturating_pow(attempt));
    let jitter_ms = rand::thread_rng().gen_range(0..=1000);
    let capped_ms = exp_ms
        .saturating_add(jitter_ms)
        .min(config.max_delay.as_millis() as u64);
    Duration::from_millis(capped_ms)
}

/// Run `op` up to `config.max_retries` times.
///
/// State machine per attempt: success returns; a permanent failure returns
/// the raw error immediately; a transient failure sleeps and retries,
/// except on the last attempt, which returns [`ChatError::UpstreamBusy`].
pub async fn run_with_retry<T, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T, ChatError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let max_attempts = config.max_retries.max(1);

    for attempt in 0..max_attempts {
        match op().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(attempt = attempt + 1, "Upstream call succeeded after retries");
                }
                return Ok(value);
            }
            Err(err) => match FailureClass::of(&err) {
                FailureClass::Permanent => {
                    tracing::error!(
                        attempt = attempt + 1,
                        error = %err,
                        "Non-retryable upstream error"
                    );
                    return Err(ChatError::Upstream(err));
                }
                FailureClass::Transient => {
                    if attempt + 1 == max_attempts {
                        tracing::error!(
                            attempts = max_attempts,
                            error = %err,
                            "Retries exhausted, upstream still rate limited"
                        );
                        return Err(ChatError::UpstreamBusy);
                    }

                    let delay = backoff_delay(config, attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Upstream overloaded, backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                }
            },
        }
    }

    // Every iteration returns: success, permanent, or exhaustion on the
    // final attempt.
    unreachable!("retry loop always returns from within its body")
}
