//! Error types for the gateway core.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Error taxonomy for the USSD gateway.
///
/// Variants are grouped by where they originate so that the turn handler
/// can decide what the caller sees: only [`GatewayError::InvalidRequest`]
/// may surface as a non-200 response; everything else is converted into a
/// well-formed USSD frame.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    // ═══════════════════════════════════════════════════════════
    // Request Errors
    // ═══════════════════════════════════════════════════════════

    /// Missing or malformed request fields.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// User input failed a validation rule.
    #[error("Validation failed: {0}")]
    Validation(String),

    // ═══════════════════════════════════════════════════════════
    // Session Errors
    // ═══════════════════════════════════════════════════════════

    /// No session record exists for the composite key.
    #[error("Session not found")]
    SessionNotFound,

    // ═══════════════════════════════════════════════════════════
    // Infrastructure Errors
    // ═══════════════════════════════════════════════════════════

    /// The key/value cluster or the upstream backend is unreachable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The upstream backend returned a failure status.
    #[error("Upstream denied ({status}): {message}")]
    UpstreamDenied {
        /// Raw status code from the backend.
        status: String,
        /// Human-readable message mapped from the status.
        message: String,
    },

    /// A referenced menu node does not exist.
    #[error("Menu not found: {0}")]
    MenuNotFound(String),

    /// Value could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Unexpected failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns `true` if this error is caused by the caller's request and
    /// may surface as an HTTP 400.
    #[must_use]
    pub const fn is_request_error(&self) -> bool {
        matches!(self, Self::InvalidRequest(_))
    }

    /// Returns `true` if the operation may succeed on retry.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::UpstreamDenied { .. })
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
