//! Conversation history: bounded in-memory store, retention sweep, and the
//! durable snapshot layer.

mod retention;
mod snapshot;
mod store;

pub use snapshot::{Snapshot, SnapshotStore};
pub use store::{HistoryStore, Message, Role, StoreStats};
