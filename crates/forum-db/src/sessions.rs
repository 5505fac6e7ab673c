use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

use crate::models::SessionRow;
use crate::{Database, DbError, OptionalExt, Result, token};

impl Database {
    /// Start a session for `user_id`, replacing any session the user already
    /// has. One live session per user: logging in elsewhere logs out the
    /// previous device.
    pub fn create_session(
        &self,
        user_id: &str,
        client_addr: Option<&str>,
        ttl: Duration,
    ) -> Result<SessionRow> {
        let now = Utc::now();
        let session = SessionRow {
            user_id: user_id.to_string(),
            token: token::generate(),
            client_addr: client_addr.map(str::to_string),
            created_at: now,
            expires_at: now + ttl,
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (user_id, session_token, client_addr, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(user_id) DO UPDATE SET
                     session_token = excluded.session_token,
                     client_addr   = excluded.client_addr,
                     created_at    = excluded.created_at,
                     expires_at    = excluded.expires_at",
                rusqlite::params![
                    session.user_id,
                    session.token,
                    session.client_addr,
                    session.created_at,
                    session.expires_at,
                ],
            )?;
            Ok(())
        })?;

        Ok(session)
    }

    /// Look up a live session. Expired rows are reported as `Expired` and
    /// left in place for the sweeper.
    pub fn find_session(&self, token: &str) -> Result<SessionRow> {
        self.find_session_at(token, Utc::now())
    }

    pub fn find_session_at(&self, token: &str, now: DateTime<Utc>) -> Result<SessionRow> {
        let session = self.find_session_any(token)?.ok_or(DbError::NotFound)?;
        if !session.is_live_at(now) {
            return Err(DbError::Expired);
        }
        Ok(session)
    }

    /// Look up a session regardless of expiry.
    pub fn find_session_any(&self, token: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| query_session(conn, token))
    }

    /// Remove the user's session. Succeeds when there is none.
    pub fn invalidate_session(&self, user_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE user_id = ?1", [user_id])?;
            Ok(())
        })
    }

    /// Delete every session whose expiry is at or before `now`.
    pub fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM sessions WHERE expires_at <= ?1",
                rusqlite::params![now],
            )?;
            Ok(deleted)
        })
    }
}

fn query_session(conn: &Connection, token: &str) -> Result<Option<SessionRow>> {
    conn.query_row(
        "SELECT user_id, session_token, client_addr, created_at, expires_at
         FROM sessions WHERE session_token = ?1",
        [token],
        |row| {
            Ok(SessionRow {
                user_id: row.get(0)?,
                token: row.get(1)?,
                client_addr: row.get(2)?,
                created_at: row.get(3)?,
                expires_at: row.get(4)?,
            })
        },
    )
    .optional()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_user() -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("alice", "alice@example.com", "hash").unwrap();
        (db, user.id)
    }

    #[test]
    fn created_session_resolves() {
        let (db, user_id) = db_with_user();
        let session = db
            .create_session(&user_id, Some("127.0.0.1:5000"), Duration::hours(24))
            .unwrap();

        let found = db.find_session(&session.token).unwrap();
        assert_eq!(found.user_id, user_id);
        assert_eq!(found.client_addr.as_deref(), Some("127.0.0.1:5000"));
        assert_eq!(found.expires_at, session.expires_at);
    }

    #[test]
    fn second_login_replaces_first_session() {
        let (db, user_id) = db_with_user();
        let first = db.create_session(&user_id, None, Duration::hours(1)).unwrap();
        let second = db.create_session(&user_id, None, Duration::hours(1)).unwrap();

        assert_ne!(first.token, second.token);
        assert!(matches!(db.find_session(&first.token), Err(DbError::NotFound)));
        assert_eq!(db.find_session(&second.token).unwrap().user_id, user_id);

        let rows: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM sessions WHERE user_id = ?1", [&user_id], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn expired_session_is_reported_but_kept() {
        let (db, user_id) = db_with_user();
        let session = db.create_session(&user_id, None, Duration::minutes(10)).unwrap();

        let later = session.expires_at + Duration::seconds(1);
        assert!(matches!(db.find_session_at(&session.token, later), Err(DbError::Expired)));
        // Exactly at expiry is no longer live.
        assert!(matches!(
            db.find_session_at(&session.token, session.expires_at),
            Err(DbError::Expired)
        ));
        assert!(db.find_session_any(&session.token).unwrap().is_some());
    }

    #[test]
    fn invalidate_is_idempotent() {
        let (db, user_id) = db_with_user();
        let session = db.create_session(&user_id, None, Duration::hours(1)).unwrap();

        db.invalidate_session(&user_id).unwrap();
        db.invalidate_session(&user_id).unwrap();
        assert!(matches!(db.find_session(&session.token), Err(DbError::NotFound)));
    }

    #[test]
    fn sweep_removes_only_expired_sessions() {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_user("alice", "alice@example.com", "hash").unwrap();
        let bob = db.create_user("bobby", "bob@example.com", "hash").unwrap();

        db.create_session(&alice.id, None, Duration::seconds(-5)).unwrap();
        let live = db.create_session(&bob.id, None, Duration::hours(1)).unwrap();

        assert_eq!(db.delete_expired_sessions(Utc::now()).unwrap(), 1);
        assert!(db.find_session(&live.token).is_ok());
    }
}
