use chrono::Utc;
use forum_types::models::ProviderProfile;
use rand::Rng;
use rand::distr::Alphanumeric;
use rusqlite::{Connection, Row};
use tracing::info;
use uuid::Uuid;

use crate::models::UserRow;
use crate::{Database, DbError, OptionalExt, Result, is_unique_violation};

const USER_COLUMNS: &str =
    "user_id, username, email, password_hash, provider, provider_id, provider_email, created_at";

/// Suffixed attempts after the base name is taken, and again random
/// attempts once those run out.
const MAX_USERNAME_ATTEMPTS: usize = 10;
const SUFFIX_LEN: usize = 4;

/// Length bounds for usernames, in characters.
#[derive(Debug, Clone, Copy)]
pub struct UsernameBounds {
    pub min: usize,
    pub max: usize,
}

impl Default for UsernameBounds {
    fn default() -> Self {
        Self { min: 5, max: 15 }
    }
}

impl Database {
    // -- Credential store --

    /// Insert a password account. The uniqueness checks and the insert share
    /// one transaction so two concurrent registrations cannot both pass.
    pub fn create_user(&self, username: &str, email: &str, password_hash: &str) -> Result<UserRow> {
        self.with_tx(|tx| {
            if username_taken(tx, username)? {
                return Err(DbError::DuplicateUsername);
            }
            if email_taken(tx, email)? {
                return Err(DbError::DuplicateEmail);
            }

            let row = UserRow {
                id: Uuid::new_v4().to_string(),
                username: username.to_string(),
                email: email.to_string(),
                password_hash: Some(password_hash.to_string()),
                provider: None,
                provider_id: None,
                provider_email: None,
                created_at: Utc::now(),
            };
            insert_user(tx, &row)?;
            Ok(row)
        })
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<UserRow> {
        self.with_conn(|conn| {
            query_user(conn, "email = ?1", email)?.ok_or(DbError::NotFound)
        })
    }

    pub fn find_user_by_id(&self, id: &str) -> Result<UserRow> {
        self.with_conn(|conn| query_user(conn, "user_id = ?1", id)?.ok_or(DbError::NotFound))
    }

    /// Stored hash for a user. OAuth-only accounts have none and report `NotFound`.
    pub fn get_password_hash(&self, user_id: &str) -> Result<String> {
        self.with_conn(|conn| {
            let hash: Option<Option<String>> = conn
                .query_row(
                    "SELECT password_hash FROM users WHERE user_id = ?1",
                    [user_id],
                    |row| row.get(0),
                )
                .optional()?;
            hash.flatten().ok_or(DbError::NotFound)
        })
    }

    #[cfg(test)]
    pub(crate) fn find_user_by_provider(&self, provider: &str, provider_id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_provider(conn, provider, provider_id))
    }

    // -- OAuth --

    /// Find the user bound to this provider identity, or create one.
    ///
    /// Refuses with `EmailConflict` when the email already belongs to a
    /// password account; accounts are never linked implicitly. Runs in a
    /// single transaction so concurrent callbacks for the same identity
    /// produce one user. Returns `(user, is_new_user)`.
    pub fn resolve_oauth_user(
        &self,
        profile: &ProviderProfile,
        bounds: UsernameBounds,
    ) -> Result<(UserRow, bool)> {
        self.with_tx(|tx| {
            if let Some(existing) = query_user_by_provider(tx, &profile.provider, &profile.provider_id)? {
                return Ok((existing, false));
            }

            let password_owned: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1 AND password_hash IS NOT NULL)",
                [&profile.email],
                |row| row.get(0),
            )?;
            if password_owned {
                return Err(DbError::EmailConflict);
            }
            // Another provider account already holds this email.
            if email_taken(tx, &profile.email)? {
                return Err(DbError::DuplicateEmail);
            }

            let username = unique_username(tx, &profile.email, bounds, &mut random_name)?;
            let row = UserRow {
                id: Uuid::new_v4().to_string(),
                username,
                email: profile.email.clone(),
                password_hash: None,
                provider: Some(profile.provider.clone()),
                provider_id: Some(profile.provider_id.clone()),
                provider_email: Some(profile.email.clone()),
                created_at: Utc::now(),
            };
            insert_user(tx, &row)?;

            info!("Created {} user {} ({})", profile.provider, row.username, row.id);
            Ok((row, true))
        })
    }
}

fn insert_user(conn: &Connection, row: &UserRow) -> Result<()> {
    conn.execute(
        "INSERT INTO users (user_id, username, email, password_hash, provider, provider_id, provider_email, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            row.id,
            row.username,
            row.email,
            row.password_hash,
            row.provider,
            row.provider_id,
            row.provider_email,
            row.created_at,
        ],
    )
    .map_err(|e| {
        // The pre-checks run in the same transaction; this only fires if the
        // schema and the checks disagree.
        if is_unique_violation(&e) {
            DbError::DuplicateUsername
        } else {
            DbError::Sqlite(e)
        }
    })?;
    Ok(())
}

fn username_taken(conn: &Connection, username: &str) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
        [username],
        |row| row.get(0),
    )?)
}

fn email_taken(conn: &Connection, email: &str) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
        [email],
        |row| row.get(0),
    )?)
}

fn query_user(conn: &Connection, predicate: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {predicate}");
    conn.query_row(&sql, [value], map_user).optional()
}

fn query_user_by_provider(conn: &Connection, provider: &str, provider_id: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE provider = ?1 AND provider_id = ?2");
    conn.query_row(&sql, [provider, provider_id], map_user).optional()
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        provider: row.get(4)?,
        provider_id: row.get(5)?,
        provider_email: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Pick a free username inside `bounds`: the name derived from the email,
/// then that name's stem plus a random suffix, then a fully random name.
/// `random(len)` supplies the random parts.
fn unique_username(
    conn: &Connection,
    email: &str,
    bounds: UsernameBounds,
    random: &mut dyn FnMut(usize) -> String,
) -> Result<String> {
    let base = username_from_email(email, bounds);
    if !username_taken(conn, &base)? {
        return Ok(base);
    }

    // stem + suffix never exceeds max, and the stem is either all of base
    // (already >= min) or max - SUFFIX_LEN long.
    let stem: String = base.chars().take(bounds.max.saturating_sub(SUFFIX_LEN)).collect();
    if !stem.is_empty() {
        for _ in 0..MAX_USERNAME_ATTEMPTS {
            let candidate = format!("{stem}{}", random(SUFFIX_LEN));
            if !username_taken(conn, &candidate)? {
                return Ok(candidate);
            }
        }
    }

    let len = bounds.max.max(1);
    for _ in 0..MAX_USERNAME_ATTEMPTS {
        let candidate = random(len);
        if !username_taken(conn, &candidate)? {
            return Ok(candidate);
        }
    }

    Err(DbError::DuplicateUsername)
}

/// Derive a username from the email local part: ASCII alphanumerics only,
/// padded with "user" when too short, truncated to the upper bound.
pub fn username_from_email(email: &str, bounds: UsernameBounds) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let mut name: String = local.chars().filter(|c| c.is_ascii_alphanumeric()).collect();

    if name.is_empty() {
        name.push_str("user");
    }
    while name.len() < bounds.min {
        name.push_str("user");
    }
    name.truncate(bounds.max.max(1));
    name
}

fn random_name(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}
