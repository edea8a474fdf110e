//! Wellspring: a conversational-support backend.
//!
//! Forwards user messages to a generative text model, keeps bounded
//! per-user conversation history in memory, detects crisis language, and
//! persists state to a crash-safe JSON snapshot.

pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod safety;
pub mod server;
pub mod session;

pub use config::Config;
pub use error::{Error, Result};
