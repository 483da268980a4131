use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;

use protocol::SessionResolver;

use crate::db::{DirectoryStore, Session};
use crate::error::Result;

pub const SESSION_ID_LEN: usize = 32;

/// Issues and resolves session ids. Sessions never expire; they live as long
/// as the store does.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn DirectoryStore>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn DirectoryStore>) -> Self {
        Self { store }
    }

    pub fn create_session(&self, username: &str) -> Result<Session> {
        let session = Session {
            session_id: generate_session_id(),
            username: username.to_string(),
        };

        self.store
            .create_session(&session.session_id, &session.username)?;

        log::info!("Created session for user {}", username);
        Ok(session)
    }

    /// The username owning `session_id`, if any.
    pub fn validate_session(&self, session_id: &str) -> Result<Option<String>> {
        Ok(self.store.get_username_by_session(session_id)?)
    }

    pub fn active_sessions(&self) -> Result<usize> {
        Ok(self.store.session_count()?)
    }
}

impl SessionResolver for SessionManager {
    fn resolve(&self, session_id: &str) -> Option<String> {
        match self.validate_session(session_id) {
            Ok(username) => username,
            Err(err) => {
                log::error!("Session lookup failed: {}", err);
                None
            }
        }
    }
}

pub fn generate_session_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use std::collections::HashSet;

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(MemoryStore::default()))
    }

    #[test]
    fn test_session_id_shape() {
        let id = generate_session_id();
        assert_eq!(id.len(), SESSION_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_session_ids_are_distinct() {
        let ids: HashSet<String> = (0..10_000).map(|_| generate_session_id()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_create_and_validate_session() {
        let manager = manager();
        let session = manager.create_session("alice").unwrap();

        assert_eq!(
            manager.validate_session(&session.session_id).unwrap().as_deref(),
            Some("alice")
        );
        assert_eq!(manager.resolve(&session.session_id).as_deref(), Some("alice"));
        assert_eq!(manager.resolve("not-a-session"), None);
        assert_eq!(manager.active_sessions().unwrap(), 1);
    }

    #[test]
    fn test_relogin_keeps_earlier_sessions() {
        let manager = manager();
        let first = manager.create_session("alice").unwrap();
        let second = manager.create_session("alice").unwrap();

        assert_ne!(first.session_id, second.session_id);
        assert!(manager.resolve(&first.session_id).is_some());
        assert!(manager.resolve(&second.session_id).is_some());
    }
}
