//! Error types for the relay.

use cop_relay_core::CoreError;
use cop_relay_perms::PermsError;
use cop_relay_store::StoreError;
use cop_relay_stream::StreamError;
use thiserror::Error;

/// Errors that can occur during relay operations.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Core decoding error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Stream or listener error.
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    /// Entitlement resolution error.
    #[error("permission error: {0}")]
    Permission(#[from] PermsError),

    /// The request carried no bearer token.
    #[error("missing bearer token")]
    MissingToken,

    /// An object id did not parse.
    #[error("invalid object id: {0:?}")]
    InvalidId(String),

    /// Query parameters were unusable.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Configuration was rejected.
    #[error("configuration error: {0}")]
    Config(String),

    /// A collaborator could not be reached at startup.
    #[error("startup failed: {0}")]
    Startup(String),
}

impl RelayError {
    /// Whether the caller sent a bad request, as opposed to an
    /// infrastructure failure.
    pub fn is_caller_error(&self) -> bool {
        match self {
            RelayError::MissingToken | RelayError::InvalidId(_) | RelayError::InvalidQuery(_) => {
                true
            }
            RelayError::Store(StoreError::InvalidQuery(_)) => true,
            RelayError::Core(CoreError::InvalidId(_) | CoreError::InvalidGeometry(_)) => true,
            _ => false,
        }
    }
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_error_classification() {
        assert!(RelayError::MissingToken.is_caller_error());
        assert!(RelayError::InvalidId("x".into()).is_caller_error());
        assert!(RelayError::Store(StoreError::InvalidQuery("range".into())).is_caller_error());
        assert!(!RelayError::Permission(PermsError::Unavailable("down".into())).is_caller_error());
        assert!(!RelayError::Startup("no db".into()).is_caller_error());
    }
}
