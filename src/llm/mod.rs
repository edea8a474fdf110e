//! Upstream LLM boundary: provider trait, failure classification, and the
//! retry/backoff controller.

mod gemini;
mod provider;
mod retry;

pub use gemini::GeminiProvider;
pub use provider::{ChatProvider, FailureClass};
pub use retry::run_with_retry;
