//! Session registry: maps opaque session ids to long-lived handler
//! instances, so a stateless request transport can carry state across calls.
//!
//! Generic over the handler type; the server crate plugs in its per-session
//! protocol handler. At most one handler per id, lookups are non-blocking
//! map reads, removal is idempotent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

pub struct SessionRegistry<H> {
    sessions: Mutex<HashMap<String, Arc<H>>>,
}

impl<H> Default for SessionRegistry<H> {
    fn default() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

impl<H> SessionRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new handler under a fresh session id.
    pub fn create(&self, handler: H) -> String {
        let id = Uuid::new_v4().to_string();
        let mut sessions = self.sessions.lock().expect("session lock poisoned");
        sessions.insert(id.clone(), Arc::new(handler));
        tracing::debug!(session_id = %id, sessions = sessions.len(), "session created");
        id
    }

    pub fn get(&self, id: &str) -> Option<Arc<H>> {
        let sessions = self.sessions.lock().expect("session lock poisoned");
        sessions.get(id).map(Arc::clone)
    }

    /// Remove a session mapping. Returns whether it existed; removing an
    /// absent id is a no-op.
    pub fn remove(&self, id: &str) -> bool {
        let mut sessions = self.sessions.lock().expect("session lock poisoned");
        let existed = sessions.remove(id).is_some();
        if existed {
            tracing::debug!(session_id = %id, sessions = sessions.len(), "session removed");
        }
        existed
    }

    pub fn count(&self) -> usize {
        self.sessions.lock().expect("session lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Handler {
        label: &'static str,
    }

    #[test]
    fn create_get_round_trip() {
        let registry = SessionRegistry::new();
        let id = registry.create(Handler { label: "first" });

        let handler = registry.get(&id).expect("session present");
        assert_eq!(handler.label, "first");
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn ids_are_unique_per_session() {
        let registry = SessionRegistry::new();
        let a = registry.create(Handler { label: "a" });
        let b = registry.create(Handler { label: "b" });

        assert_ne!(a, b);
        assert_eq!(registry.get(&a).unwrap().label, "a");
        assert_eq!(registry.get(&b).unwrap().label, "b");
    }

    #[test]
    fn unknown_id_is_none_and_mutates_nothing() {
        let registry = SessionRegistry::new();
        let id = registry.create(Handler { label: "only" });

        assert!(registry.get("bogus").is_none());
        assert_eq!(registry.count(), 1);
        assert!(registry.get(&id).is_some());
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = SessionRegistry::new();
        let id = registry.create(Handler { label: "gone" });

        assert!(registry.remove(&id));
        assert!(!registry.remove(&id));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn handler_instance_persists_across_lookups() {
        let registry = SessionRegistry::new();
        let id = registry.create(Handler { label: "stable" });

        let first = registry.get(&id).unwrap();
        let second = registry.get(&id).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
