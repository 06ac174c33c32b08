use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// Cookie carrying the session id.
pub const SESSION_COOKIE: &str = "burrow_session";
/// Cookie carrying the OAuth2 `state` between `/login` and `/callback`.
pub const OAUTH_STATE_COOKIE: &str = "burrow_oauth_state";

const SESSION_ID_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: i64,
}

/// Server-side sessions keyed by an opaque random id. Lives in memory; a
/// restart signs everyone out.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session for `user_id` and return its id.
    pub fn create(&self, user_id: i64) -> String {
        let id = random_id();
        self.sessions.write().insert(id.clone(), Session { user_id });
        id
    }

    pub fn get(&self, id: &str) -> Option<Session> {
        self.sessions.read().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Session> {
        self.sessions.write().remove(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Hex-encoded random value used for session ids and OAuth2 state.
pub fn random_id() -> String {
    hex::encode(rand::random::<[u8; SESSION_ID_BYTES]>())
}
