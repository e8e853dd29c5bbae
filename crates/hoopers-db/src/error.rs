use rusqlite::ffi;
use thiserror::Error;

/// Result type alias for database operations.
pub type Result<T> = std::result::Result<T, DbError>;

/// Errors surfaced by the storage layer. Handlers map these onto HTTP
/// statuses; nothing in here is swallowed or collapsed into a catch-all.
#[derive(Debug, Error)]
pub enum DbError {
    /// The named entity does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A uniqueness or state rule was violated (duplicate username,
    /// double follow, full run, insufficient stock, ...).
    #[error("{0}")]
    Conflict(&'static str),

    /// Pagination cursor failed to decode or did not match the listing.
    #[error("invalid pagination cursor")]
    InvalidCursor,

    /// Cursor serialization failed while building a page.
    #[error("failed to encode cursor: {0}")]
    CursorEncode(#[from] serde_json::Error),

    /// Underlying SQLite error.
    #[error("database error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// A connection mutex was poisoned by a panicking thread.
    #[error("database lock poisoned")]
    LockPoisoned,
}

impl DbError {
    /// Maps a unique-key violation onto `Conflict(what)`; every other
    /// SQLite error passes through unchanged.
    pub(crate) fn on_unique(what: &'static str) -> impl Fn(rusqlite::Error) -> DbError {
        move |e| {
            if is_unique_violation(&e) {
                DbError::Conflict(what)
            } else {
                DbError::Sql(e)
            }
        }
    }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || f.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}
