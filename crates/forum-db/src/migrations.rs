use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            user_id         TEXT PRIMARY KEY,
            username        TEXT NOT NULL UNIQUE COLLATE NOCASE,
            email           TEXT NOT NULL UNIQUE COLLATE NOCASE,
            password_hash   TEXT,
            provider        TEXT,
            provider_id     TEXT,
            provider_email  TEXT,
            created_at      TEXT NOT NULL,
            CHECK (password_hash IS NOT NULL OR provider_id IS NOT NULL)
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_users_provider
            ON users(provider, provider_id);

        -- One row per user: a new login replaces the previous session.
        CREATE TABLE IF NOT EXISTS sessions (
            user_id         TEXT PRIMARY KEY REFERENCES users(user_id) ON DELETE CASCADE,
            session_token   TEXT NOT NULL UNIQUE,
            client_addr     TEXT,
            created_at      TEXT NOT NULL,
            expires_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_expires
            ON sessions(expires_at);

        CREATE TABLE IF NOT EXISTS posts (
            post_id     TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS comments (
            comment_id  TEXT PRIMARY KEY,
            post_id     TEXT NOT NULL REFERENCES posts(post_id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_comments_post
            ON comments(post_id, created_at);

        CREATE TABLE IF NOT EXISTS post_reactions (
            user_id         TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
            post_id         TEXT NOT NULL REFERENCES posts(post_id) ON DELETE CASCADE,
            reaction_type   INTEGER NOT NULL CHECK (reaction_type IN (1, 2)),
            created_at      TEXT NOT NULL,
            PRIMARY KEY (user_id, post_id)
        );

        CREATE INDEX IF NOT EXISTS idx_post_reactions_post
            ON post_reactions(post_id, reaction_type);

        CREATE TABLE IF NOT EXISTS comment_reactions (
            user_id         TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
            comment_id      TEXT NOT NULL REFERENCES comments(comment_id) ON DELETE CASCADE,
            reaction_type   INTEGER NOT NULL CHECK (reaction_type IN (1, 2)),
            created_at      TEXT NOT NULL,
            PRIMARY KEY (user_id, comment_id)
        );

        CREATE INDEX IF NOT EXISTS idx_comment_reactions_comment
            ON comment_reactions(comment_id, reaction_type);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
