//! Error types for the stream module.

use thiserror::Error;

use cop_relay_core::{StreamEventType, StreamKind};

/// Why a sink refused an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// The receiving side has gone away.
    #[error("sink closed")]
    Closed,

    /// The sink's buffer is full.
    #[error("sink buffer full")]
    Full,

    /// The event carries a payload for the other stream kind.
    #[error("{event:?} cannot be sent on a {kind:?} stream")]
    WrongKind {
        event: StreamEventType,
        kind: StreamKind,
    },

    /// Transport-specific failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors that can occur in stream sessions and the listener.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Sending to a client failed.
    #[error("send failed: {0}")]
    Send(#[from] SendError),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] cop_relay_store::StoreError),

    /// Resolving the subscriber's entitlements failed.
    #[error("permission error: {0}")]
    Perms(#[from] cop_relay_perms::PermsError),

    /// Listener or session settings are unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A client with this id is already registered.
    #[error("client {0} is already registered")]
    DuplicateClient(String),
}

/// Result type for stream operations.
pub type Result<T> = std::result::Result<T, StreamError>;
