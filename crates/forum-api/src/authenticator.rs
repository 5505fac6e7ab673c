use forum_db::models::SessionRow;
use forum_db::{Database, DbError};
use forum_types::api::RegisterRequest;
use forum_types::models::{ProviderProfile, User};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::password::PasswordHasher;
use crate::settings::AuthSettings;

/// Login, logout and request-time identity resolution over the credential
/// and session stores. All calls block on SQLite and, for password checks,
/// on Argon2; async callers run them under `spawn_blocking`.
pub struct Authenticator<'a> {
    db: &'a Database,
    hasher: &'a PasswordHasher,
    settings: &'a AuthSettings,
}

impl<'a> Authenticator<'a> {
    pub fn new(db: &'a Database, hasher: &'a PasswordHasher, settings: &'a AuthSettings) -> Self {
        Self { db, hasher, settings }
    }

    pub fn register(&self, req: &RegisterRequest) -> Result<User, ApiError> {
        let username = req.username.trim();
        let email = req.email.trim();
        self.validate_registration(username, email, req)?;

        let hash = self.hasher.hash(&req.password).map_err(ApiError::internal)?;
        let row = self.db.create_user(username, email, &hash)?;

        info!("Registered user {} ({})", row.username, row.id);
        Ok(row.into())
    }

    /// Check credentials and open a session, replacing any existing one.
    ///
    /// Unknown email, OAuth-only account and wrong password all fail the same
    /// way, and take about as long.
    pub fn login(
        &self,
        email: &str,
        password: &str,
        client_addr: Option<&str>,
    ) -> Result<(User, SessionRow), ApiError> {
        let user = match self.db.find_user_by_email(email.trim()) {
            Ok(user) => user,
            Err(DbError::NotFound) => {
                self.hasher.verify_dummy(password);
                return Err(ApiError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        let hash = match self.db.get_password_hash(&user.id) {
            Ok(hash) => hash,
            Err(DbError::NotFound) => {
                self.hasher.verify_dummy(password);
                return Err(ApiError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        if !self.hasher.verify(password, &hash) {
            return Err(ApiError::InvalidCredentials);
        }

        let session = self
            .db
            .create_session(&user.id, client_addr, self.settings.session_ttl)?;
        info!("User {} logged in", user.id);
        Ok((user.into(), session))
    }

    /// End the session behind `token`. Unknown or already-ended sessions are
    /// not an error.
    pub fn logout(&self, token: &str) -> Result<(), ApiError> {
        if let Some(session) = self.db.find_session_any(token)? {
            self.db.invalidate_session(&session.user_id)?;
            info!("User {} logged out", session.user_id);
        }
        Ok(())
    }

    /// Who is making this request, if anyone. A missing, unknown or expired
    /// session is anonymity, not an error.
    pub fn resolve_identity(&self, token: Option<&str>) -> Result<Option<User>, ApiError> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(None);
        };

        let session = match self.db.find_session(token) {
            Ok(session) => session,
            Err(DbError::NotFound) => return Ok(None),
            Err(DbError::Expired) => {
                debug!("Ignoring expired session cookie");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        match self.db.find_user_by_id(&session.user_id) {
            Ok(user) => Ok(Some(user.into())),
            Err(DbError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve (or create) the user behind a provider profile and open a
    /// session. Returns `(user, session, is_new_user)`.
    pub fn oauth_login(
        &self,
        profile: &ProviderProfile,
        client_addr: Option<&str>,
    ) -> Result<(User, SessionRow, bool), ApiError> {
        let (user, is_new) = self.db.resolve_oauth_user(profile, self.settings.username)?;
        let session = self
            .db
            .create_session(&user.id, client_addr, self.settings.session_ttl)?;
        info!("User {} logged in via {}", user.id, profile.provider);
        Ok((user.into(), session, is_new))
    }

    fn validate_registration(
        &self,
        username: &str,
        email: &str,
        req: &RegisterRequest,
    ) -> Result<(), ApiError> {
        let bounds = self.settings.username;
        let name_len = username.chars().count();
        if name_len < bounds.min || name_len > bounds.max {
            return Err(ApiError::Validation(format!(
                "username must be between {} and {} characters",
                bounds.min, bounds.max
            )));
        }
        if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ApiError::Validation(
                "username may only contain letters, digits and underscores".into(),
            ));
        }

        if !looks_like_email(email) {
            return Err(ApiError::Validation("invalid email address".into()));
        }

        let pw_len = req.password.chars().count();
        if pw_len < self.settings.password_min || pw_len > self.settings.password_max {
            return Err(ApiError::Validation(format!(
                "password must be between {} and {} characters",
                self.settings.password_min, self.settings.password_max
            )));
        }
        if req.password != req.confirm_password {
            return Err(ApiError::Validation("passwords do not match".into()));
        }

        Ok(())
    }
}

/// Gate for protected routes.
pub fn require_identity(identity: Option<User>) -> Result<User, ApiError> {
    identity.ok_or(ApiError::Unauthorized)
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::cheap_hasher;
    use chrono::Duration;

    struct Fixture {
        db: Database,
        hasher: PasswordHasher,
        settings: AuthSettings,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                db: Database::open_in_memory().unwrap(),
                hasher: cheap_hasher(),
                settings: AuthSettings::default(),
            }
        }

        fn auth(&self) -> Authenticator<'_> {
            Authenticator::new(&self.db, &self.hasher, &self.settings)
        }
    }

    fn registration(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            confirm_password: password.into(),
        }
    }

    #[test]
    fn login_then_resolve_returns_same_user() {
        let fx = Fixture::new();
        let alice = fx
            .auth()
            .register(&registration("alice", "alice@example.com", "Passw0rd"))
            .unwrap();

        let (user, session) = fx
            .auth()
            .login("alice@example.com", "Passw0rd", Some("10.0.0.1:4242"))
            .unwrap();
        assert_eq!(user.id, alice.id);

        let resolved = fx.auth().resolve_identity(Some(&session.token)).unwrap();
        assert_eq!(resolved, Some(alice));
    }

    #[test]
    fn wrong_password_and_unknown_email_fail_identically() {
        let fx = Fixture::new();
        fx.auth()
            .register(&registration("alice", "alice@example.com", "Passw0rd"))
            .unwrap();

        let wrong = fx.auth().login("alice@example.com", "nope-nope", None).unwrap_err();
        let unknown = fx.auth().login("ghost@example.com", "Passw0rd", None).unwrap_err();

        assert!(matches!(wrong, ApiError::InvalidCredentials));
        assert!(matches!(unknown, ApiError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
        assert_eq!(wrong.status(), unknown.status());
    }

    #[test]
    fn oauth_only_account_cannot_password_login() {
        let fx = Fixture::new();
        let profile = ProviderProfile {
            provider: "google".into(),
            provider_id: "g-1".into(),
            email: "dana@example.com".into(),
            name: "Dana".into(),
        };
        fx.auth().oauth_login(&profile, None).unwrap();

        let err = fx.auth().login("dana@example.com", "anything", None).unwrap_err();
        assert!(matches!(err, ApiError::InvalidCredentials));
    }

    #[test]
    fn new_login_invalidates_previous_token() {
        let fx = Fixture::new();
        fx.auth()
            .register(&registration("alice", "alice@example.com", "Passw0rd"))
            .unwrap();

        let (_, first) = fx.auth().login("alice@example.com", "Passw0rd", None).unwrap();
        let (_, second) = fx.auth().login("alice@example.com", "Passw0rd", None).unwrap();

        assert_eq!(fx.auth().resolve_identity(Some(&first.token)).unwrap(), None);
        assert!(fx.auth().resolve_identity(Some(&second.token)).unwrap().is_some());
    }

    #[test]
    fn logout_is_idempotent() {
        let fx = Fixture::new();
        fx.auth()
            .register(&registration("alice", "alice@example.com", "Passw0rd"))
            .unwrap();
        let (_, session) = fx.auth().login("alice@example.com", "Passw0rd", None).unwrap();

        fx.auth().logout(&session.token).unwrap();
        fx.auth().logout(&session.token).unwrap();
        fx.auth().logout("never-issued").unwrap();
        assert_eq!(fx.auth().resolve_identity(Some(&session.token)).unwrap(), None);
    }

    #[test]
    fn expired_session_resolves_to_anonymous() {
        let mut fx = Fixture::new();
        fx.settings.session_ttl = Duration::seconds(-1);
        fx.auth()
            .register(&registration("alice", "alice@example.com", "Passw0rd"))
            .unwrap();
        let (_, session) = fx.auth().login("alice@example.com", "Passw0rd", None).unwrap();

        assert_eq!(fx.auth().resolve_identity(Some(&session.token)).unwrap(), None);
        assert_eq!(fx.auth().resolve_identity(None).unwrap(), None);
        assert_eq!(fx.auth().resolve_identity(Some("")).unwrap(), None);
    }

    #[test]
    fn require_identity_gates_anonymous() {
        assert!(matches!(require_identity(None), Err(ApiError::Unauthorized)));
    }

    #[test]
    fn registration_is_validated() {
        let fx = Fixture::new();
        let auth = fx.auth();

        let short_name = auth.register(&registration("al", "al@example.com", "Passw0rd"));
        assert!(matches!(short_name, Err(ApiError::Validation(_))));

        let bad_email = auth.register(&registration("alice", "alice.example.com", "Passw0rd"));
        assert!(matches!(bad_email, Err(ApiError::Validation(_))));

        let mut mismatch = registration("alice", "alice@example.com", "Passw0rd");
        mismatch.confirm_password = "Passw0rd!".into();
        assert!(matches!(auth.register(&mismatch), Err(ApiError::Validation(_))));

        auth.register(&registration("alice", "alice@example.com", "Passw0rd"))
            .unwrap();
        let duplicate = auth.register(&registration("alice", "other@example.com", "Passw0rd"));
        assert!(matches!(duplicate, Err(ApiError::Conflict(_))));
    }

    #[test]
    fn oauth_email_conflict_creates_nothing() {
        let fx = Fixture::new();
        fx.auth()
            .register(&registration("alice", "alice@example.com", "Passw0rd"))
            .unwrap();

        let profile = ProviderProfile {
            provider: "google".into(),
            provider_id: "g-2".into(),
            email: "alice@example.com".into(),
            name: "Alice".into(),
        };
        let err = fx.auth().oauth_login(&profile, None).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        let users: i64 = fx
            .db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?))
            .unwrap();
        let sessions: i64 = fx
            .db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!((users, sessions), (1, 0));
    }
}
