//! Typed envelope for upstream responses.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status values the backend uses for success.
const SUCCESS_STATUSES: &[&str] = &["000", "00", "0", "OK", "SUCCESS"];

/// `true` if the raw status code denotes success.
#[must_use]
pub fn is_success_status(status: &str) -> bool {
    SUCCESS_STATUSES.contains(&status)
}

/// Decoded upstream response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamEnvelope {
    /// `true` iff the status is one of the success codes.
    pub success: bool,

    /// Raw status code from the backend.
    pub status: String,

    /// Machine code: the raw status for parsed responses, or a transport
    /// error code.
    pub code: String,

    /// Decoded key/value pairs.
    #[serde(default)]
    pub data: BTreeMap<String, String>,

    /// Raw response body after tag stripping.
    pub raw: String,

    /// Human message: `DATA` or `MESSAGE` field when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Mapped human error message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// `true` when the caller may usefully retry.
    #[serde(default)]
    pub retry: bool,
}

impl UpstreamEnvelope {
    /// Envelope returned for any transport-level failure.
    #[must_use]
    pub fn connection_error() -> Self {
        Self {
            success: false,
            status: "ERROR".to_string(),
            code: "API_CONNECTION_ERROR".to_string(),
            data: BTreeMap::new(),
            raw: String::new(),
            message: None,
            error: Some("Service temporarily unavailable. Please try again.".to_string()),
            retry: true,
        }
    }

    /// Value of a decoded field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    /// The human message, or an empty string.
    #[must_use]
    pub fn message_or_empty(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }
}

/// Cached envelope with its capture time, as stored in the
/// `api_cache_{key}` slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedEnvelope {
    /// The cached response.
    pub envelope: UpstreamEnvelope,

    /// Capture time in epoch milliseconds.
    pub timestamp_millis: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_statuses() {
        for status in ["000", "00", "0", "OK", "SUCCESS"] {
            assert!(is_success_status(status), "{status} should be success");
        }
        for status in ["091", "102", "ERROR", ""] {
            assert!(!is_success_status(status), "{status} should be failure");
        }
    }

    #[test]
    fn test_connection_error_envelope() {
        let envelope = UpstreamEnvelope::connection_error();
        assert!(!envelope.success);
        assert_eq!(envelope.code, "API_CONNECTION_ERROR");
        assert!(envelope.retry);
        assert_eq!(
            envelope.error.as_deref(),
            Some("Service temporarily unavailable. Please try again.")
        );
    }
}
