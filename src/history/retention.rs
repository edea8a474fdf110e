//! Age-based retention sweep.
//!
//! Runs once at startup (the facade may call it again if a schedule is ever
//! wanted); any removal is followed by a persistence write in the caller.

use std::time::Duration;

use chrono::Utc;

use crate::history::store::HistoryStore;

impl HistoryStore {
    /// Remove every message older than `max_age`, and every user whose
    /// history becomes empty. Returns the number of messages removed.
    pub fn sweep(&mut self, max_age: Duration) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(max_age).unwrap_or_else(|_| chrono::Duration::days(30));

        let mut removed = 0;
        self.users_mut().retain(|user, history| {
            let before = history.len();
            history.retain(|msg| msg.timestamp > cutoff);
            let dropped = before - history.len();
            if dropped > 0 {
                removed += dropped;
                tracing::info!(user, dropped, "Swept expired messages");
            }
            if history.is_empty() {
                tracing::info!(user, "Removing user with no remaining messages");
                false
            } else {
                true
            }
        });

        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::store::{Message, Role};

    const THIRTY_DAYS: Duration = Duration::from_secs(30 * 24 * 60 * 60);

    fn message_aged(days: i64, content: &str) -> Message {
        Message {
            role: Role::User,
            content: content.to_string(),
            timestamp: Utc::now() - chrono::Duration::days(days),
        }
    }

    #[test]
    fn sweep_removes_31_day_old_keeps_29_day_old() {
        let mut store = HistoryStore::new(10, 30);
        store
            .users_mut()
            .insert("alice".to_string(), vec![message_aged(31, "old"), message_aged(29, "fresh")]);

        let removed = store.sweep(THIRTY_DAYS);

        assert_eq!(removed, 1);
        let kept = store.export("alice").unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].content, "fresh");
    }

    #[test]
    fn sweep_drops_user_left_empty() {
        let mut store = HistoryStore::new(10, 30);
        store
            .users_mut()
            .insert("bob".to_string(), vec![message_aged(40, "ancient")]);

        let removed = store.sweep(THIRTY_DAYS);

        assert_eq!(removed, 1);
        assert_eq!(store.stats().active_users, 0);
        assert!(store.export("bob").is_err());
    }

    #[test]
    fn sweep_on_fresh_store_is_noop() {
        let mut store = HistoryStore::new(10, 30);
        store.append("carol", Role::User, "hi");

        assert_eq!(store.sweep(THIRTY_DAYS), 0);
        assert_eq!(store.stats().total_messages, 1);
    }
}
