//! Error types for the permissions module.

use thiserror::Error;

/// Errors that can occur while resolving or applying entitlements.
#[derive(Debug, Error)]
pub enum PermsError {
    /// The entitlement service could not be reached.
    #[error("entitlement service unavailable: {0}")]
    Unavailable(String),

    /// The entitlement service answered with a non-success status.
    #[error("entitlement request rejected with status {status}")]
    Rejected { status: u16 },

    /// The entitlement service answered with something we cannot read.
    #[error("invalid entitlement response: {0}")]
    InvalidResponse(String),

    /// The resolver was misconfigured (bad endpoint, TLS setup).
    #[error("resolver configuration error: {0}")]
    Configuration(String),

    /// An object's search attributes could not be decoded.
    #[error("malformed search attributes: {0}")]
    MalformedAttributes(String),

    /// Core error.
    #[error("core error: {0}")]
    CoreError(#[from] cop_relay_core::CoreError),
}

impl PermsError {
    /// Whether retrying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            PermsError::Unavailable(_) => true,
            PermsError::Rejected { status } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
