//! Key/value store abstraction.
//!
//! The session store talks to a minimal key/value/TTL interface; the
//! clustered Redis implementation and the in-memory test double both live
//! behind this trait.

use crate::error::Result;
use async_trait::async_trait;

/// Minimal key/value interface with TTL support.
///
/// Errors from the underlying cluster surface as
/// [`GatewayError::Unavailable`](crate::error::GatewayError::Unavailable);
/// this layer does not retry — callers decide.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Store a value.
    ///
    /// When `ttl_seconds` is `None` the existing TTL on the key (if any)
    /// must be preserved, not cleared.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unavailable`](crate::error::GatewayError::Unavailable)
    /// if the cluster cannot be reached within the readiness bound.
    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()>;

    /// Fetch a value, or `None` if the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unavailable`](crate::error::GatewayError::Unavailable)
    /// if the cluster cannot be reached within the readiness bound.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Delete a key. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unavailable`](crate::error::GatewayError::Unavailable)
    /// if the cluster cannot be reached within the readiness bound.
    async fn del(&self, key: &str) -> Result<()>;

    /// Probe the underlying store.
    async fn healthy(&self) -> bool;
}
