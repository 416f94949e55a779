//! Error types for the relay core.

use thiserror::Error;

/// Core errors raised while decoding domain values.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid object id: {0}")]
    InvalidId(String),

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("malformed search attributes: {0}")]
    MalformedAttributes(String),

    #[error("encoding error: {0}")]
    EncodingError(String),
}

/// Errors for a single change notification payload.
///
/// A payload error never affects the connection it arrived on; the
/// offending notification is dropped.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("invalid object id {value:?}: {reason}")]
    InvalidId { value: String, reason: String },

    #[error("invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid content blob: {0}")]
    InvalidContentBlob(String),
}

impl From<CoreError> for PayloadError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidId(value) => PayloadError::InvalidId {
                value,
                reason: "not a uuid".into(),
            },
            CoreError::InvalidGeometry(msg) => PayloadError::InvalidGeometry(msg),
            CoreError::MalformedAttributes(msg) | CoreError::EncodingError(msg) => {
                PayloadError::Malformed(msg)
            }
        }
    }
}

impl From<serde_json::Error> for PayloadError {
    fn from(e: serde_json::Error) -> Self {
        PayloadError::Malformed(e.to_string())
    }
}
