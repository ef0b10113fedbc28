//! Error type for the HTTP layer.
//!
//! The telco channel cannot display HTTP errors, so only invalid request
//! parameters surface as a non-200: a plain-text `end` frame with status
//! 400. Every other failure is converted into a well-formed USSD frame
//! before it reaches this type.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::fmt;

/// HTTP-facing application error.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    source: Option<anyhow::Error>,
}

impl AppError {
    /// A 400 for missing or malformed request parameters.
    #[must_use]
    pub fn invalid_parameters() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "Invalid parameters".to_string(),
            source: None,
        }
    }

    /// Attach the underlying error for logging.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(source) = &self.source {
            tracing::warn!(status = %self.status, message = %self.message, error = %source, "Request rejected");
        } else {
            tracing::warn!(status = %self.status, message = %self.message, "Request rejected");
        }

        (
            self.status,
            [(header::CONTENT_TYPE, "text/plain")],
            format!("end {}", self.message),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameters_shape() {
        let err = AppError::invalid_parameters();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "[400 Bad Request] Invalid parameters");
    }
}
