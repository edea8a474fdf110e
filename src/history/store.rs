//! Bounded in-memory conversation store.
//!
//! Single source of truth for conversation state during the process
//! lifetime. All operations are pure in-memory transforms; the facade in
//! [`crate::session`] is responsible for locking and for flushing snapshots.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::HistoryError;

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single conversation turn. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a message stamped with the current time.
    pub fn now(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Snapshot of store counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub active_users: usize,
    pub total_messages: usize,
}

/// Bounded, ordered, multi-user message log.
///
/// Invariants, enforced after every [`append`](Self::append):
/// - at most `max_users` users are held;
/// - each user's history holds at most `max_messages_per_user` messages,
///   and the retained messages are the most recent ones in original order.
pub struct HistoryStore {
    users: IndexMap<String, Vec<Message>>,
    max_users: usize,
    max_messages_per_user: usize,
}

impl HistoryStore {
    /// Create an empty store. Both bounds are clamped to at least 1.
    pub fn new(max_users: usize, max_messages_per_user: usize) -> Self {
        Self {
            users: IndexMap::new(),
            max_users: max_users.max(1),
            max_messages_per_user: max_messages_per_user.max(1),
        }
    }

    /// Hydrate a store from persisted data, re-enforcing both bounds in
    /// case the snapshot was written under a larger configuration.
    pub fn from_snapshot(
        users: IndexMap<String, Vec<Message>>,
        max_users: usize,
        max_messages_per_user: usize,
    ) -> Self {
        let mut store = Self::new(max_users, max_messages_per_user);
        for (user, mut history) in users {
            if history.len() > store.max_messages_per_user {
                let excess = history.len() - store.max_messages_per_user;
                history.drain(..excess);
            }
            if store.users.len() >= store.max_users {
                break;
            }
            store.users.insert(user, history);
        }
        store
    }

    /// Append a message for `user`, creating the user if needed.
    ///
    /// If the user is new and the store is full, the least-recently-inserted
    /// user (first key in iteration order) is evicted entirely first. This
    /// is a fixed policy, not best-effort LRU: an old user who is still
    /// active keeps their insertion position and can be evicted.
    ///
    /// After the append the user's history is truncated from the front to
    /// `max_messages_per_user` entries.
    pub fn append(&mut self, user: &str, role: Role, content: impl Into<String>) -> Message {
        if !self.users.contains_key(user) && self.users.len() >= self.max_users {
            if let Some((evicted, history)) = self.users.shift_remove_index(0) {
                tracing::warn!(
                    evicted_user = %evicted,
                    dropped_messages = history.len(),
                    max_users = self.max_users,
                    "User capacity reached, evicting least-recently-inserted user"
                );
            }
        }

        let message = Message::now(role, content);
        let history = self.users.entry(user.to_string()).or_default();
        history.push(message.clone());

        if history.len() > self.max_messages_per_user {
            let excess = history.len() - self.max_messages_per_user;
            history.drain(..excess);
            tracing::info!(
                user,
                kept = self.max_messages_per_user,
                "Trimmed conversation history to cap"
            );
        }

        message
    }

    /// The last `max_messages` entries for `user`, oldest first.
    /// Empty for unknown users.
    pub fn context(&self, user: &str, max_messages: usize) -> Vec<Message> {
        match self.users.get(user) {
            Some(history) => {
                let start = history.len().saturating_sub(max_messages);
                history[start..].to_vec()
            }
            None => Vec::new(),
        }
    }

    /// Remove a user entirely. Returns the number of messages removed,
    /// 0 if the user was unknown.
    pub fn clear(&mut self, user: &str) -> usize {
        self.users
            .shift_remove(user)
            .map(|history| history.len())
            .unwrap_or(0)
    }

    /// All messages for `user`, or [`HistoryError::UserNotFound`].
    pub fn export(&self, user: &str) -> Result<Vec<Message>, HistoryError> {
        self.users
            .get(user)
            .cloned()
            .ok_or_else(|| HistoryError::UserNotFound {
                user: user.to_string(),
            })
    }

    /// Current counters.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            active_users: self.users.len(),
            total_messages: self.users.values().map(Vec::len).sum(),
        }
    }

    pub(crate) fn users(&self) -> &IndexMap<String, Vec<Message>> {
        &self.users
    }

    pub(crate) fn users_mut(&mut self) -> &mut IndexMap<String, Vec<Message>> {
        &mut self.users
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn append_returns_stamped_message() {
        let mut store = HistoryStore::new(10, 10);
        let msg = store.append("alice", Role::User, "hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "hello");
        assert_eq!(store.stats().total_messages, 1);
    }

    #[test]
    fn per_user_cap_keeps_most_recent_suffix() {
        let mut store = HistoryStore::new(10, 30);
        for i in 0..31 {
            store.append("alice", Role::User, format!("msg-{i}"));
        }

        let history = store.export("alice").unwrap();
        assert_eq!(history.len(), 30);
        // The oldest of the original 31 is gone, the newest is last.
        assert_eq!(history[0].content, "msg-1");
        assert_eq!(history[29].content, "msg-30");
        // Order is preserved.
        for (i, msg) in history.iter().enumerate() {
            assert_eq!(msg.content, format!("msg-{}", i + 1));
        }
    }

    #[test]
    fn cap_holds_after_every_append() {
        let mut store = HistoryStore::new(10, 5);
        for i in 0..20 {
            store.append("bob", Role::Assistant, format!("m{i}"));
            assert!(store.export("bob").unwrap().len() <= 5);
        }
    }

    #[test]
    fn user_capacity_evicts_first_inserted_only() {
        let mut store = HistoryStore::new(3, 10);
        store.append("first", Role::User, "a");
        store.append("second", Role::User, "b");
        store.append("third", Role::User, "c");
        // "first" is least recently inserted even if it spoke again.
        store.append("first", Role::User, "a2");

        store.append("fourth", Role::User, "d");

        assert_eq!(store.stats().active_users, 3);
        assert!(store.export("first").is_err());
        assert!(store.export("second").is_ok());
        assert!(store.export("third").is_ok());
        assert!(store.export("fourth").is_ok());
    }

    #[test]
    fn context_returns_last_n_in_order() {
        let mut store = HistoryStore::new(10, 30);
        for i in 0..10 {
            store.append("alice", Role::User, format!("m{i}"));
        }

        let ctx = store.context("alice", 6);
        assert_eq!(ctx.len(), 6);
        assert_eq!(ctx[0].content, "m4");
        assert_eq!(ctx[5].content, "m9");
    }

    #[test]
    fn context_for_unknown_user_is_empty() {
        let store = HistoryStore::new(10, 30);
        assert!(store.context("ghost", 6).is_empty());
    }

    #[test]
    fn context_shorter_than_limit() {
        let mut store = HistoryStore::new(10, 30);
        store.append("alice", Role::User, "only");
        assert_eq!(store.context("alice", 6).len(), 1);
    }

    #[test]
    fn clear_reports_removed_count() {
        let mut store = HistoryStore::new(10, 30);
        store.append("alice", Role::User, "one");
        store.append("alice", Role::Assistant, "two");

        assert_eq!(store.clear("alice"), 2);
        assert_eq!(store.clear("alice"), 0);
        assert_eq!(store.stats().active_users, 0);
    }

    #[test]
    fn export_unknown_user_is_not_found() {
        let store = HistoryStore::new(10, 30);
        assert!(matches!(
            store.export("nobody"),
            Err(HistoryError::UserNotFound { .. })
        ));
    }

    #[test]
    fn stats_counts_across_users() {
        let mut store = HistoryStore::new(10, 30);
        store.append("a", Role::User, "1");
        store.append("a", Role::Assistant, "2");
        store.append("b", Role::User, "3");

        let stats = store.stats();
        assert_eq!(stats.active_users, 2);
        assert_eq!(stats.total_messages, 3);
    }

    #[test]
    fn from_snapshot_re_enforces_message_cap() {
        let mut users = IndexMap::new();
        let history: Vec<Message> = (0..10)
            .map(|i| Message::now(Role::User, format!("m{i}")))
            .collect();
        users.insert("alice".to_string(), history);

        let store = HistoryStore::from_snapshot(users, 10, 5);
        let kept = store.export("alice").unwrap();
        assert_eq!(kept.len(), 5);
        assert_eq!(kept[0].content, "m5");
    }

    #[test]
    fn bounds_are_clamped_to_one() {
        let mut store = HistoryStore::new(0, 0);
        store.append("a", Role::User, "x");
        store.append("a", Role::User, "y");
        assert_eq!(store.export("a").unwrap().len(), 1);
        assert_eq!(store.export("a").unwrap()[0].content, "y");
    }
}
