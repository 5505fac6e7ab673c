use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// How long a login round trip may take before its state token lapses.
pub const STATE_TTL_MINUTES: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    NotFound,
    Expired,
}

#[derive(Debug, Clone)]
struct OAuthState {
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// In-process registry of pending OAuth state tokens.
///
/// Built once at startup and shared through the app state. One mutex covers
/// issue, consume and sweep, so a token is consumed at most once even when
/// two callbacks race. Not shared across server replicas.
pub struct OAuthStateStore {
    states: Mutex<HashMap<String, OAuthState>>,
    ttl: Duration,
}

impl Default for OAuthStateStore {
    fn default() -> Self {
        Self::new(Duration::minutes(STATE_TTL_MINUTES))
    }
}

impl OAuthStateStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Register a fresh random state token.
    pub fn issue(&self) -> String {
        self.issue_at(Utc::now())
    }

    pub fn issue_at(&self, now: DateTime<Utc>) -> String {
        let token = forum_db::token::generate();
        let entry = OAuthState {
            created_at: now,
            expires_at: now + self.ttl,
        };
        self.lock().insert(token.clone(), entry);
        token
    }

    /// Look up and remove `token` in one step. The entry is removed even when
    /// it turns out to be expired.
    pub fn consume(&self, token: &str) -> Result<(), StateError> {
        self.consume_at(token, Utc::now())
    }

    pub fn consume_at(&self, token: &str, now: DateTime<Utc>) -> Result<(), StateError> {
        let entry = self.lock().remove(token).ok_or(StateError::NotFound)?;
        if now >= entry.expires_at {
            debug!(
                "OAuth state issued at {} expired at {}",
                entry.created_at, entry.expires_at
            );
            return Err(StateError::Expired);
        }
        Ok(())
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut states = self.lock();
        let before = states.len();
        states.retain(|_, entry| now < entry.expires_at);
        before - states.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, OAuthState>> {
        // The map stays consistent even if a holder panicked; every critical
        // section is a single map operation.
        self.states.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
