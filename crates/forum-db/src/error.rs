use thiserror::Error;

/// Storage failures. Callers branch on the variant, never on the message.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error("record not found")]
    NotFound,

    #[error("session expired")]
    Expired,

    #[error("username already taken")]
    DuplicateUsername,

    #[error("email already taken")]
    DuplicateEmail,

    /// OAuth login for an email that already belongs to a password account.
    #[error("email already registered with a password account")]
    EmailConflict,

    #[error("not the owner of this resource")]
    NotOwner,

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, DbError>;
