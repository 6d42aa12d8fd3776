//! Typed error enum for the database layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// Pool creation or the first round-trip failed.
    #[error("database connection failed: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    #[error("invalid table pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Table names interpolated into SQL must be plain identifiers.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
}

/// Connection-level failures are reported as `Connect`, everything else as `Query`.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Configuration(_) => Self::Connect(err),
            _ => Self::Query(err),
        }
    }
}
