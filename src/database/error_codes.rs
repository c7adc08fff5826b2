//! PostgreSQL Error Codes
//!
//! SQLSTATE constants used by the crate when classifying datastore failures.
//!
//! Full list: <https://www.postgresql.org/docs/current/errcodes-appendix.html>

/// PostgreSQL SQLSTATE error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PgErrorCode;

impl PgErrorCode {
    /// Unique violation (duplicate key) - Code 23505
    ///
    /// Raised by the live-recurrence partial index when two scheduler runs race
    /// to create the same recurring task.
    pub const UNIQUE_VIOLATION: &'static str = "23505";

    /// Foreign key violation - Code 23503
    pub const FOREIGN_KEY_VIOLATION: &'static str = "23503";

    /// Check constraint violation - Code 23514
    ///
    /// Balance columns carry `CHECK (quantity >= 0)`.
    pub const CHECK_VIOLATION: &'static str = "23514";

    /// Serialization failure - Code 40001
    pub const SERIALIZATION_FAILURE: &'static str = "40001";

    /// Deadlock detected - Code 40P01
    pub const DEADLOCK_DETECTED: &'static str = "40P01";

    /// Undefined table - Code 42P01
    pub const UNDEFINED_TABLE: &'static str = "42P01";

    pub fn is_unique_violation(code: &str) -> bool {
        code == Self::UNIQUE_VIOLATION
    }

    pub fn is_foreign_key_violation(code: &str) -> bool {
        code == Self::FOREIGN_KEY_VIOLATION
    }

    pub fn is_check_violation(code: &str) -> bool {
        code == Self::CHECK_VIOLATION
    }

    /// Transaction rollbacks that succeed when simply re-run.
    pub fn is_transient(code: &str) -> bool {
        matches!(code, Self::SERIALIZATION_FAILURE | Self::DEADLOCK_DETECTED)
    }
}

/// SQLSTATE and constraint name of a database error, if it is one.
pub fn database_error_details(err: &sqlx::Error) -> Option<(String, Option<String>)> {
    match err {
        sqlx::Error::Database(db_err) => Some((
            db_err.code().map(|c| c.into_owned()).unwrap_or_default(),
            db_err.constraint().map(str::to_string),
        )),
        _ => None,
    }
}
