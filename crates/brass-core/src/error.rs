//! Error types shared by the Brass crates.
//!
//! Framework-level errors (handler failures, context preconditions) live in
//! `brass-framework`.

use thiserror::Error;

// =============================================================================
// API Errors
// =============================================================================

/// Errors returned by the platform client.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The platform answered with a non-success status.
    #[error("api error {status}: {message}")]
    Api {
        /// HTTP-like status code.
        status: u16,
        /// Error message reported by the platform.
        message: String,
    },

    /// The request could not reach the platform.
    #[error("network error: {0}")]
    Network(String),

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// The request was aborted through its cancellation token.
    #[error("request cancelled")]
    Cancelled,

    /// The response could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The client does not implement this call.
    #[error("operation '{0}' is not supported by this client")]
    NotSupported(&'static str),
}

impl ApiError {
    /// Creates an API error with the given status and message.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Status code of an [`ApiError::Api`] error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` for [`ApiError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

// =============================================================================
// Decode Errors
// =============================================================================

/// Errors raised while decoding a raw update.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The object has no string `update_type` field.
    #[error("update has no 'update_type' tag")]
    MissingTag,

    /// The payload does not match the shape of its tag.
    #[error("failed to decode '{tag}' update: {source}")]
    Json {
        /// The update tag that was being decoded.
        tag: String,
        #[source]
        source: serde_json::Error,
    },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for platform calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for update decoding.
pub type DecodeResult<T> = Result<T, DecodeError>;
