//! Conversation State Manager: bounded, process-local chat history keyed by
//! user and optional trip.
//!
//! Sessions live in a [`SessionStore`]. The default [`InMemorySessionStore`]
//! holds them for the lifetime of the process; nothing is persisted and
//! nothing is shared across instances. Each session sits behind its own
//! mutex, so appends to one key are serialized while different keys proceed
//! independently. The mutex is never held across an await point.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of messages retained per session.
pub const MAX_SESSION_MESSAGES: usize = 20;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Identifies a session: one per user for general chat, plus one per
/// (user, trip) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub user_id: String,
    pub trip_id: Option<Uuid>,
}

impl SessionKey {
    pub fn new(user_id: impl Into<String>, trip_id: Option<Uuid>) -> Self {
        Self {
            user_id: user_id.into(),
            trip_id,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.trip_id {
            Some(trip_id) => write!(f, "{}:{}", self.user_id, trip_id),
            None => f.write_str(&self.user_id),
        }
    }
}

/// The ordered message history of one session.
#[derive(Debug, Default)]
pub struct ConversationSession {
    messages: Vec<Message>,
}

impl ConversationSession {
    fn push(&mut self, message: Message, limit: usize) {
        self.messages.push(message);
        if self.messages.len() > limit {
            let overflow = self.messages.len() - limit;
            self.messages.drain(..overflow);
        }
    }
}

/// A shared reference to one session. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<Mutex<ConversationSession>>,
}

impl SessionHandle {
    fn lock(&self) -> MutexGuard<'_, ConversationSession> {
        // push and drain leave the Vec valid even if a holder panicked.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether two handles refer to the same underlying session.
    pub fn same_session(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Key -> session mapping. Swap the implementation (e.g. for an external
/// cache) without touching the orchestrator.
pub trait SessionStore: Send + Sync {
    /// Return the session for `key`, creating an empty one on first access.
    fn get_or_create(&self, key: &SessionKey) -> SessionHandle;

    /// The session for `key`, if one exists. Never creates.
    fn get(&self, key: &SessionKey) -> Option<SessionHandle>;

    /// Remove the session entirely. Returns whether one existed.
    fn remove(&self, key: &SessionKey) -> bool;

    /// Number of live sessions.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<SessionKey, SessionHandle>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionKey, SessionHandle>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionStore for InMemorySessionStore {
    fn get_or_create(&self, key: &SessionKey) -> SessionHandle {
        self.sessions().entry(key.clone()).or_default().clone()
    }

    fn get(&self, key: &SessionKey) -> Option<SessionHandle> {
        self.sessions().get(key).cloned()
    }

    fn remove(&self, key: &SessionKey) -> bool {
        self.sessions().remove(key).is_some()
    }

    fn len(&self) -> usize {
        self.sessions().len()
    }
}

/// Front door to conversation state: key construction, bounded append,
/// snapshots and clearing.
#[derive(Clone)]
pub struct ConversationManager {
    store: Arc<dyn SessionStore>,
    limit: usize,
}

impl ConversationManager {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            limit: MAX_SESSION_MESSAGES,
        }
    }

    /// A manager over a fresh [`InMemorySessionStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemorySessionStore::new()))
    }

    pub fn get_or_create(&self, user_id: &str, trip_id: Option<Uuid>) -> SessionHandle {
        self.store.get_or_create(&SessionKey::new(user_id, trip_id))
    }

    pub fn get(&self, user_id: &str, trip_id: Option<Uuid>) -> Option<SessionHandle> {
        self.store.get(&SessionKey::new(user_id, trip_id))
    }

    /// Append a message stamped with the current time, dropping the oldest
    /// messages so at most [`MAX_SESSION_MESSAGES`] remain.
    pub fn append(&self, session: &SessionHandle, role: Role, content: impl Into<String>) {
        let message = Message {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        };
        session.lock().push(message, self.limit);
    }

    /// Snapshot of the session's messages, oldest first.
    pub fn history(&self, session: &SessionHandle) -> Vec<Message> {
        session.lock().messages.clone()
    }

    /// Remove the session for this key. A later `get_or_create` starts empty.
    pub fn clear(&self, user_id: &str, trip_id: Option<Uuid>) -> bool {
        let key = SessionKey::new(user_id, trip_id);
        let removed = self.store.remove(&key);
        tracing::debug!(session = %key, removed, "cleared conversation");
        removed
    }

    pub fn session_count(&self) -> usize {
        self.store.len()
    }
}

impl fmt::Debug for ConversationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationManager")
            .field("sessions", &self.store.len())
            .field("limit", &self.limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(history: &[Message]) -> Vec<String> {
        history.iter().map(|m| m.content.clone()).collect()
    }

    #[test]
    fn session_key_display_joins_user_and_trip() {
        let trip = Uuid::nil();
        assert_eq!(SessionKey::new("u1", None).to_string(), "u1");
        assert_eq!(
            SessionKey::new("u1", Some(trip)).to_string(),
            format!("u1:{trip}")
        );
    }

    #[test]
    fn history_never_exceeds_limit_and_keeps_latest_in_order() {
        let manager = ConversationManager::in_memory();
        let session = manager.get_or_create("u1", None);

        for n in 0..57 {
            manager.append(&session, Role::User, format!("m{n}"));
            assert!(manager.history(&session).len() <= MAX_SESSION_MESSAGES);
        }

        let expected: Vec<String> = (37..57).map(|n| format!("m{n}")).collect();
        assert_eq!(contents(&manager.history(&session)), expected);
    }

    #[test]
    fn short_history_is_kept_whole() {
        let manager = ConversationManager::in_memory();
        let session = manager.get_or_create("u1", None);
        manager.append(&session, Role::User, "hi");
        manager.append(&session, Role::Assistant, "hello");

        let history = manager.history(&session);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].role, Role::Assistant);
        assert!(history[0].timestamp <= history[1].timestamp);
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let manager = ConversationManager::in_memory();
        let trip = Some(Uuid::new_v4());
        let a = manager.get_or_create("u1", trip);
        let b = manager.get_or_create("u1", trip);

        assert!(a.same_session(&b));
        manager.append(&a, Role::User, "visible through b");
        assert_eq!(contents(&manager.history(&b)), vec!["visible through b"]);
        assert_eq!(manager.session_count(), 1);
    }

    #[test]
    fn trip_sessions_are_separate_from_general_chat() {
        let manager = ConversationManager::in_memory();
        let general = manager.get_or_create("u1", None);
        let trip = manager.get_or_create("u1", Some(Uuid::new_v4()));
        let other_user = manager.get_or_create("u2", None);

        manager.append(&general, Role::User, "general");
        assert!(manager.history(&trip).is_empty());
        assert!(manager.history(&other_user).is_empty());
        assert_eq!(manager.session_count(), 3);
    }

    #[test]
    fn clear_then_get_or_create_yields_empty_session() {
        let manager = ConversationManager::in_memory();
        let trip = Some(Uuid::new_v4());
        let before = manager.get_or_create("u1", trip);
        manager.append(&before, Role::User, "old");

        assert!(manager.clear("u1", trip));
        assert_eq!(manager.session_count(), 0);

        let after = manager.get_or_create("u1", trip);
        assert!(manager.history(&after).is_empty());
        assert!(!after.same_session(&before));
    }

    #[test]
    fn get_does_not_create_sessions() {
        let manager = ConversationManager::in_memory();
        assert!(manager.get("u1", None).is_none());
        assert_eq!(manager.session_count(), 0);

        let created = manager.get_or_create("u1", None);
        let found = manager.get("u1", None).unwrap();
        assert!(found.same_session(&created));
        assert!(manager.get("u1", Some(Uuid::new_v4())).is_none());
        assert_eq!(manager.session_count(), 1);
    }

    #[test]
    fn clear_missing_session_reports_false() {
        let manager = ConversationManager::in_memory();
        assert!(!manager.clear("nobody", None));
    }

    #[test]
    fn concurrent_appends_lose_nothing() {
        let manager = ConversationManager::in_memory();
        let session = manager.get_or_create("u1", None);

        std::thread::scope(|scope| {
            for t in 0..4 {
                let manager = manager.clone();
                let session = session.clone();
                scope.spawn(move || {
                    for n in 0..5 {
                        manager.append(&session, Role::User, format!("t{t}-{n}"));
                    }
                });
            }
        });

        let history = manager.history(&session);
        assert_eq!(history.len(), MAX_SESSION_MESSAGES);
        // Each thread's own messages stay in the order it appended them.
        for t in 0..4 {
            let prefix = format!("t{t}-");
            let mine: Vec<&str> = history
                .iter()
                .filter_map(|m| m.content.strip_prefix(&prefix))
                .collect();
            assert_eq!(mine, vec!["0", "1", "2", "3", "4"]);
        }
    }
}
