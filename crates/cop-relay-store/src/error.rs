//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur talking to the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from Postgres.
    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// Connection string or pool settings could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The notification connection went away.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Channel names must be non-empty identifiers.
    #[error("invalid channel name: {0:?}")]
    InvalidChannel(String),

    /// The query could not be run as given.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
