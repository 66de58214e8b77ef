//! Shared types for the REST layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::core_state::CoreState;
use crate::models::Actor;

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
/// Wraps `CoreState` plus the in-memory session table.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
    pub sessions: Arc<Mutex<SessionStore>>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>, session_ttl: Duration) -> Self {
        Self {
            core,
            sessions: Arc::new(Mutex::new(SessionStore::new(session_ttl))),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Bearer tokens
// ═══════════════════════════════════════════════════════════

/// Hash a bearer token string using SHA-256.
pub fn hash_token(token: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Generate a random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    use base64::Engine;
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

// ═══════════════════════════════════════════════════════════
// Session store
// ═══════════════════════════════════════════════════════════

#[derive(Debug)]
struct SessionEntry {
    actor: Actor,
    expires_at: Instant,
}

/// Logged-in sessions keyed by token hash. Raw tokens are never stored.
/// Sessions do not survive a restart.
pub struct SessionStore {
    sessions: HashMap<[u8; 32], SessionEntry>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Start a session and return its bearer token.
    pub fn issue(&mut self, actor: Actor) -> String {
        if self.sessions.len() > 1000 {
            self.purge_expired();
        }
        let token = generate_token();
        self.sessions.insert(
            hash_token(&token),
            SessionEntry {
                actor,
                expires_at: Instant::now() + self.ttl,
            },
        );
        token
    }

    /// The actor behind a live token. Expired tokens are dropped.
    pub fn validate(&mut self, token: &str) -> Option<Actor> {
        let key = hash_token(token);
        match self.sessions.get(&key) {
            Some(entry) if Instant::now() < entry.expires_at => Some(entry.actor.clone()),
            Some(_) => {
                self.sessions.remove(&key);
                None
            }
            None => None,
        }
    }

    /// End a session. Returns whether it existed.
    pub fn revoke(&mut self, token: &str) -> bool {
        self.sessions.remove(&hash_token(token)).is_some()
    }

    pub fn purge_expired(&mut self) {
        let now = Instant::now();
        self.sessions.retain(|_, entry| now < entry.expires_at);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::models::Role;

    fn actor() -> Actor {
        Actor::new(Uuid::new_v4(), Role::Doctor, "Dr. Grey")
    }

    #[test]
    fn token_hash_deterministic() {
        let h1 = hash_token("test-token");
        let h2 = hash_token("test-token");
        assert_eq!(h1, h2);
        assert_ne!(hash_token("other-token"), h1);
    }

    #[test]
    fn generate_token_unique() {
        let t1 = generate_token();
        let t2 = generate_token();
        assert_ne!(t1, t2);
        assert_eq!(t1.len(), 43); // 32 bytes → 43 base64url chars
    }

    #[test]
    fn issued_token_resolves_to_actor() {
        let mut store = SessionStore::new(Duration::from_secs(60));
        let who = actor();
        let token = store.issue(who.clone());
        assert_eq!(store.validate(&token), Some(who));
        assert_eq!(store.validate("forged"), None);
    }

    #[test]
    fn revoked_token_is_rejected() {
        let mut store = SessionStore::new(Duration::from_secs(60));
        let token = store.issue(actor());
        assert!(store.revoke(&token));
        assert!(!store.revoke(&token));
        assert_eq!(store.validate(&token), None);
        assert!(store.is_empty());
    }

    #[test]
    fn expired_token_is_rejected_and_dropped() {
        let mut store = SessionStore::new(Duration::ZERO);
        let token = store.issue(actor());
        assert_eq!(store.validate(&token), None);
        assert_eq!(store.len(), 0);
    }
}
