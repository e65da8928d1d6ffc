//! Session registry. Tracks every live session indexed by ID and by user.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use staytuned_core::error::AppError;
use staytuned_core::result::AppResult;
use staytuned_core::types::{SessionId, UserId};

use super::handle::Session;

/// Thread-safe registry of all live sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    /// Session ID → session for direct lookup.
    by_id: DashMap<SessionId, Arc<Session>>,
    /// User ID → that user's sessions (one per device).
    by_user: DashMap<UserId, Vec<Arc<Session>>>,
}

impl SessionRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session. Fails with `Conflict` if the ID is already registered.
    pub fn register(&self, session: Arc<Session>) -> AppResult<()> {
        match self.by_id.entry(session.id) {
            Entry::Occupied(_) => Err(AppError::conflict(format!(
                "Session {} is already registered",
                session.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(session.clone());
                self.by_user.entry(session.user_id).or_default().push(session);
                Ok(())
            }
        }
    }

    /// Removes a session. Returns `None` if it was not registered, so
    /// duplicate disconnect signals are harmless.
    pub fn remove(&self, session_id: &SessionId) -> Option<Arc<Session>> {
        let (_, session) = self.by_id.remove(session_id)?;
        if let Some(mut sessions) = self.by_user.get_mut(&session.user_id) {
            sessions.retain(|s| s.id != *session_id);
        }
        self.by_user
            .remove_if(&session.user_id, |_, sessions| sessions.is_empty());
        Some(session)
    }

    /// Gets a session by ID, or `NotFound`.
    pub fn get(&self, session_id: &SessionId) -> AppResult<Arc<Session>> {
        self.lookup(session_id)
            .ok_or_else(|| AppError::not_found(format!("Session {session_id} not found")))
    }

    /// Gets a session by ID if registered.
    pub fn lookup(&self, session_id: &SessionId) -> Option<Arc<Session>> {
        self.by_id.get(session_id).map(|entry| entry.value().clone())
    }

    /// Gets all sessions for a user.
    pub fn sessions_for_user(&self, user_id: &UserId) -> Vec<Arc<Session>> {
        self.by_user
            .get(user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Returns all live sessions.
    pub fn all_sessions(&self) -> Vec<Arc<Session>> {
        self.by_id
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Returns total number of live sessions.
    pub fn session_count(&self) -> usize {
        self.by_id.len()
    }

    /// Returns number of users with at least one live session.
    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }
}

#[cfg(test)]
mod tests {
    use staytuned_core::error::ErrorKind;
    use staytuned_core::types::UserIdentity;

    use super::*;

    fn session_for(user_id: UserId) -> Arc<Session> {
        let (session, _rx) = Session::new(
            UserIdentity {
                user_id,
                username: "user".to_string(),
            },
            8,
        );
        Arc::new(session)
    }

    #[test]
    fn register_indexes_by_id_and_user() {
        let registry = SessionRegistry::new();
        let user = UserId::new();
        let a = session_for(user);
        let b = session_for(user);

        registry.register(a.clone()).expect("register a");
        registry.register(b.clone()).expect("register b");

        assert_eq!(registry.session_count(), 2);
        assert_eq!(registry.user_count(), 1);
        assert_eq!(registry.sessions_for_user(&user).len(), 2);
        assert_eq!(registry.get(&a.id).expect("get").id, a.id);
    }

    #[test]
    fn double_register_is_a_conflict() {
        let registry = SessionRegistry::new();
        let session = session_for(UserId::new());

        registry.register(session.clone()).expect("first");
        let err = registry.register(session).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
        assert_eq!(registry.session_count(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = SessionRegistry::new();
        let user = UserId::new();
        let session = session_for(user);
        registry.register(session.clone()).expect("register");

        assert!(registry.remove(&session.id).is_some());
        assert!(registry.remove(&session.id).is_none());
        assert!(registry.remove(&SessionId::new()).is_none());
        assert_eq!(registry.user_count(), 0);
        assert!(registry.sessions_for_user(&user).is_empty());
    }

    #[test]
    fn get_unknown_is_not_found() {
        let registry = SessionRegistry::new();
        let err = registry.get(&SessionId::new()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn removing_one_device_keeps_the_other() {
        let registry = SessionRegistry::new();
        let user = UserId::new();
        let phone = session_for(user);
        let laptop = session_for(user);
        registry.register(phone.clone()).expect("phone");
        registry.register(laptop.clone()).expect("laptop");

        registry.remove(&phone.id);

        let remaining = registry.sessions_for_user(&user);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, laptop.id);
        assert_eq!(registry.user_count(), 1);
    }
}
