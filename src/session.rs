//! Conversation session facade.
//!
//! Composes the history store, snapshot persistence, crisis detection, and
//! the retry-wrapped provider call. All store mutation plus its flush runs
//! under one `tokio::sync::Mutex` guard; the lock is **never held** during
//! the upstream call or its backoff sleeps.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::config::{HistoryConfig, RetryConfig};
use crate::error::{ChatError, HistoryError, PersistenceError};
use crate::history::{HistoryStore, Message, Role, SnapshotStore, StoreStats};
use crate::llm::{ChatProvider, run_with_retry};
use crate::safety::{CRISIS_RESPONSE, detect_crisis};

/// Outcome of [`ChatSession::respond`].
#[derive(Debug, Clone)]
pub struct ChatReply {
    /// The stored assistant message.
    pub message: Message,
    /// Whether the reply is the canned crisis response.
    pub is_crisis: bool,
}

/// Owns the conversation state for the lifetime of the process.
///
/// Constructed at startup (hydrating from the snapshot), torn down at
/// shutdown with a final [`flush`](Self::flush). All external access to the
/// store goes through this type.
pub struct ChatSession {
    store: Mutex<HistoryStore>,
    snapshot: SnapshotStore,
    provider: Arc<dyn ChatProvider>,
    retry: RetryConfig,
    context_messages: usize,
    retention: Duration,
}

impl ChatSession {
    /// Hydrate a session from the snapshot on disk (empty store when no
    /// usable snapshot exists).
    pub fn new(
        history: &HistoryConfig,
        retry: RetryConfig,
        provider: Arc<dyn ChatProvider>,
    ) -> Result<Self, PersistenceError> {
        let snapshot = SnapshotStore::new(history.snapshot_path.clone(), history.max_file_bytes)?;
        let store = HistoryStore::from_snapshot(
            snapshot.load(),
            history.max_users,
            history.max_messages_per_user,
        );
        Ok(Self {
            store: Mutex::new(store),
            snapshot,
            provider,
            retry,
            context_messages: history.context_messages,
            retention: history.retention,
        })
    }

    /// Startup housekeeping: report snapshot size and sweep expired
    /// messages, persisting if anything was removed.
    pub async fn startup(&self) {
        self.snapshot.size_check();
        let removed = self.sweep_expired().await;
        if removed > 0 {
            tracing::info!(removed, "Startup retention sweep removed expired messages");
        }
    }

    /// Model identifier of the underlying provider.
    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Append a message and persist, as one step from the caller's point of
    /// view. Persistence failures are logged, never surfaced; the in-memory
    /// store remains authoritative.
    pub async fn record(&self, user: &str, role: Role, content: &str) -> Message {
        let mut store = self.store.lock().await;
        let message = store.append(user, role, content);
        self.flush_locked(&store);
        message
    }

    /// Handle one inbound user message end to end: store it, short-circuit
    /// on crisis language, otherwise build a bounded-context prompt and call
    /// the provider through the backoff controller, storing the reply.
    pub async fn respond(&self, user: &str, text: &str) -> Result<ChatReply, ChatError> {
        self.record(user, Role::User, text).await;

        if detect_crisis(text) {
            tracing::warn!(user, "Crisis language detected, returning canned response");
            let message = self.record(user, Role::Assistant, CRISIS_RESPONSE).await;
            return Ok(ChatReply {
                message,
                is_crisis: true,
            });
        }

        let prompt = {
            let store = self.store.lock().await;
            build_prompt(user, &store.context(user, self.context_messages), text)
        };

        let generated = run_with_retry(&self.retry, || self.provider.generate(&prompt)).await?;

        let message = self.record(user, Role::Assistant, &generated).await;
        Ok(ChatReply {
            message,
            is_crisis: false,
        })
    }

    /// Delete a user's history. Returns the number of messages removed.
    pub async fn clear(&self, user: &str) -> usize {
        let mut store = self.store.lock().await;
        let removed = store.clear(user);
        if removed > 0 {
            self.flush_locked(&store);
            tracing::info!(user, removed, "Cleared conversation history");
        }
        removed
    }

    /// All stored messages for a user.
    pub async fn export(&self, user: &str) -> Result<Vec<Message>, HistoryError> {
        self.store.lock().await.export(user)
    }

    /// The most recent messages for a user (read-only, consistent copy).
    pub async fn history(&self, user: &str) -> Vec<Message> {
        self.store.lock().await.context(user, usize::MAX)
    }

    /// Current store counters.
    pub async fn stats(&self) -> StoreStats {
        self.store.lock().await.stats()
    }

    /// Remove messages older than the retention window, persisting when
    /// anything was removed. Returns the number of messages removed.
    pub async fn sweep_expired(&self) -> usize {
        let mut store = self.store.lock().await;
        let removed = store.sweep(self.retention);
        if removed > 0 {
            self.flush_locked(&store);
        }
        removed
    }

    /// Final flush, for shutdown.
    pub async fn flush(&self) {
        let store = self.store.lock().await;
        self.flush_locked(&store);
    }

    fn flush_locked(&self, store: &HistoryStore) {
        if let Err(e) = self.snapshot.save(store.users()) {
            tracing::error!(error = %e, "Failed to persist conversation snapshot");
        }
    }
}

/// Render the persona, the recent context, and the current message into a
/// single prompt string.
fn build_prompt(user: &str, context: &[Message], message: &str) -> String {
    let mut prompt = format!(
        "You are Wellness Bot, an empathetic AI mental health companion.\n\
         You're talking with {user}.\n\n\
         IMPORTANT GUIDELINES:\n\
         - Be warm, compassionate, and genuinely empathetic\n\
         - Validate their feelings first, then offer perspective\n\
         - Keep responses concise (2-3 sentences)\n\
         - Use their name naturally (but not in every response)\n\
         - NEVER attempt to diagnose or prescribe treatment\n\
         - NEVER pretend to be a professional therapist\n\
         - If they mention serious mental health concerns, acknowledge and suggest professional help\n\
         - Ask gentle follow-up questions to show you care\n"
    );

    if !context.is_empty() {
        prompt.push_str("\nConversation context:\n");
        for msg in context {
            let prefix = match msg.role {
                Role::User => "User",
                Role::Assistant => "Wellness Bot",
            };
            prompt.push_str(&format!("{prefix}: {}\n", msg.content));
        }
    }

    prompt.push_str(&format!(
        "\n{user} just said: \"{message}\"\n\nYour compassionate response:"
    ));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use crate::error::LlmError;

    /// Provider that fails a configurable number of times, then echoes.
    struct MockProvider {
        calls: AtomicU32,
        failures: u32,
        error: fn() -> LlmError,
    }

    impl MockProvider {
        fn succeeding() -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures: 0,
                error: || unreachable!(),
            }
        }

        fn failing(failures: u32, error: fn() -> LlmError) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures,
                error,
            }
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatProvider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        fn model(&self) -> &str {
            "mock-model"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err((self.error)())
            } else {
                Ok("a supportive reply".to_string())
            }
        }
    }

    fn test_history_config(dir: &std::path::Path) -> HistoryConfig {
        HistoryConfig {
            max_users: 100,
            max_messages_per_user: 30,
            context_messages: 6,
            retention: Duration::from_secs(30 * 24 * 60 * 60),
            snapshot_path: dir.join("history.json"),
            max_file_bytes: u64::MAX,
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
        }
    }

    fn session_with(provider: Arc<MockProvider>, dir: &std::path::Path) -> ChatSession {
        ChatSession::new(&test_history_config(dir), fast_retry(), provider).expect("session")
    }

    #[tokio::test]
    async fn respond_stores_both_turns() {
        let dir = tempfile::tempdir().expect("tempdir");
        let provider = Arc::new(MockProvider::succeeding());
        let session = session_with(provider, dir.path());

        let reply = session.respond("alice", "feeling stressed").await.unwrap();

        assert!(!reply.is_crisis);
        assert_eq!(reply.message.content, "a supportive reply");
        let history = session.export("alice").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn crisis_message_bypasses_provider() {
        let dir = tempfile::tempdir().expect("tempdir");
        let provider = Arc::new(MockProvider::succeeding());
        let session = session_with(provider.clone(), dir.path());

        let reply = session.respond("bob", "I want to end my life").await.unwrap();

        assert!(reply.is_crisis);
        assert_eq!(reply.message.content, CRISIS_RESPONSE);
        assert_eq!(provider.call_count(), 0, "provider must not be called");
        // Both the user message and the crisis reply are stored.
        assert_eq!(session.export("bob").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn transient_failures_are_retried_through() {
        let dir = tempfile::tempdir().expect("tempdir");
        let provider = Arc::new(MockProvider::failing(2, || LlmError::RateLimited {
            provider: "mock".into(),
            retry_after: None,
        }));
        let session = session_with(provider.clone(), dir.path());

        let reply = session.respond("carol", "hi").await.unwrap();

        assert_eq!(reply.message.content, "a supportive reply");
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_leave_user_turn_stored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let provider = Arc::new(MockProvider::failing(10, || LlmError::RateLimited {
            provider: "mock".into(),
            retry_after: None,
        }));
        let session = session_with(provider, dir.path());

        let result = session.respond("dave", "hello").await;

        assert!(matches!(result, Err(ChatError::UpstreamBusy)));
        // The inbound message was recorded before the upstream call.
        let history = session.export("dave").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);
    }

    #[tokio::test]
    async fn record_persists_across_sessions() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let session = session_with(Arc::new(MockProvider::succeeding()), dir.path());
            session.record("eve", Role::User, "remember me").await;
        }

        // A fresh session hydrates from the snapshot written above.
        let session = session_with(Arc::new(MockProvider::succeeding()), dir.path());
        let history = session.export("eve").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "remember me");
    }

    #[tokio::test]
    async fn clear_removes_and_reports() {
        let dir = tempfile::tempdir().expect("tempdir");
        let session = session_with(Arc::new(MockProvider::succeeding()), dir.path());
        session.record("frank", Role::User, "one").await;
        session.record("frank", Role::Assistant, "two").await;

        assert_eq!(session.clear("frank").await, 2);
        assert_eq!(session.clear("frank").await, 0);
        assert!(session.export("frank").await.is_err());
    }

    #[test]
    fn prompt_includes_context_and_current_message() {
        let context = vec![
            Message::now(Role::User, "I feel anxious"),
            Message::now(Role::Assistant, "That sounds hard."),
        ];
        let prompt = build_prompt("alice", &context, "still anxious");

        assert!(prompt.contains("You're talking with alice."));
        assert!(prompt.contains("User: I feel anxious"));
        assert!(prompt.contains("Wellness Bot: That sounds hard."));
        assert!(prompt.contains("alice just said: \"still anxious\""));
    }

    #[test]
    fn prompt_without_context_omits_context_block() {
        let prompt = build_prompt("bob", &[], "hello");
        assert!(!prompt.contains("Conversation context:"));
        assert!(prompt.contains("bob just said"));
    }

    #[tokio::test]
    async fn snapshot_path_parent_created() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = test_history_config(dir.path());
        config.snapshot_path = PathBuf::from(dir.path()).join("nested").join("h.json");

        let session =
            ChatSession::new(&config, fast_retry(), Arc::new(MockProvider::succeeding()))
                .expect("session");
        session.record("gina", Role::User, "hi").await;
        assert!(config.snapshot_path.exists());
    }
}
