//! Storage error types.
//!
//! [`StoreError`] is the central error type for the crate. Every fallible
//! operation on the storage boundary returns it, so callers can match on
//! one enum regardless of which backend is plugged in.

use crate::domain::SiteId;

/// Error enum covering identifier handling, tenancy lookups and backend
/// failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An identifier string did not match the `kind:site:object_id` form.
    #[error("malformed identifier: {0}")]
    IdentifierFormat(String),

    /// An object kind contained characters outside the allowed set.
    #[error("invalid object kind: {0}")]
    InvalidKind(String),

    /// A typed decode was attempted against an identifier of another kind.
    #[error("kind mismatch: expected {expected}, found {found}")]
    KindMismatch {
        /// Kind the caller asked to decode into.
        expected: String,
        /// Kind actually carried by the identifier.
        found: String,
    },

    /// No object could be constructed from the identifier's object id.
    #[error("object not found for identifier: {0}")]
    ObjectNotFound(String),

    /// The site referenced by an identifier or configuration is unknown.
    #[error("site not found: {0}")]
    SiteNotFound(SiteId),

    /// A score was `NaN` or infinite and cannot be persisted.
    #[error("score is not finite: {0}")]
    InvalidScore(f64),

    /// Backend failure (connection, query or migration).
    #[error("database error: {0}")]
    Database(String),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Database(err.to_string())
    }
}
