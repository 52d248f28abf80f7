//! Error types shared by every backend.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// All failures the store surfaces to callers.
#[derive(Debug, Error)]
pub enum Error {
    /// An aggregate's stored sequence differed from the caller's
    /// expectation. The whole push is rejected, nothing is written.
    #[error("sequence mismatch on {aggregate}: expected {expected}, current {current}")]
    SequenceNotMatched {
        aggregate: String,
        expected: u32,
        current: u32,
    },

    /// A path or pattern violated the subject rules (empty token,
    /// wildcard character in a literal, misplaced multi-token wildcard).
    #[error("invalid subjects: {0}")]
    InvalidSubjects(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl Error {
    /// Whether retrying the same call may succeed. True for Postgres
    /// serialization failures (SQLSTATE 40001) and for unique-constraint
    /// collisions on the sequence key (23505), which two pushes racing
    /// on a stream head can produce under read committed. The caller
    /// decides the retry policy; the store never retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db)) => {
                matches!(db.code().as_deref(), Some("40001") | Some("23505"))
            }
            _ => false,
        }
    }

    /// Whether the error is a rejected optimistic concurrency check.
    pub fn is_sequence_mismatch(&self) -> bool {
        matches!(self, Error::SequenceNotMatched { .. })
    }
}
