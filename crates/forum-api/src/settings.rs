use chrono::Duration;
use forum_db::users::UsernameBounds;

/// Knobs of the auth core that come from deployment configuration.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub cookie_name: String,
    /// Mark the session cookie `Secure`. Needed once served over HTTPS.
    pub cookie_secure: bool,
    pub session_ttl: Duration,
    pub username: UsernameBounds,
    pub password_min: usize,
    pub password_max: usize,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            cookie_name: "forum_session".to_string(),
            cookie_secure: false,
            session_ttl: Duration::hours(24),
            username: UsernameBounds::default(),
            password_min: 8,
            password_max: 64,
        }
    }
}
