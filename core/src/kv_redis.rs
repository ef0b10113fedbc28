//! Redis-backed key/value store.
//!
//! Thin typed facade over a clustered Redis deployment. Connection pooling
//! goes through `ConnectionManager`, which re-establishes dropped
//! connections in the background; every call is additionally bounded by
//! the configured readiness timeout so a partitioned cluster fails fast
//! instead of hanging a turn.

use crate::config::RedisConfig;
use crate::error::{GatewayError, Result};
use crate::kv::KvStore;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::future::Future;
use std::time::Duration;

/// Redis implementation of [`KvStore`].
#[derive(Clone)]
pub struct RedisKvStore {
    conn_manager: ConnectionManager,
    ready_timeout: Duration,
}

impl RedisKvStore {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unavailable`] if the client cannot be
    /// created or the initial connection fails.
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url())
            .map_err(|e| GatewayError::Unavailable(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            GatewayError::Unavailable(format!("Failed to create Redis connection manager: {e}"))
        })?;

        Ok(Self {
            conn_manager,
            ready_timeout: Duration::from_secs(config.ready_timeout_seconds),
        })
    }

    /// Bound an operation by the readiness timeout.
    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = redis::RedisResult<T>> + Send,
    {
        match tokio::time::timeout(self.ready_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(GatewayError::Unavailable(format!("Redis {op} failed: {e}"))),
            Err(_) => Err(GatewayError::Unavailable(format!(
                "Redis {op} timed out after {:?}",
                self.ready_timeout
            ))),
        }
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()> {
        let mut conn = self.conn_manager.clone();

        match ttl_seconds {
            Some(ttl) => {
                self.bounded("SETEX", conn.set_ex::<_, _, ()>(key, value, ttl))
                    .await
            }
            // KEEPTTL preserves whatever expiry the key already carries.
            None => {
                self.bounded(
                    "SET",
                    redis::cmd("SET")
                        .arg(key)
                        .arg(value)
                        .arg("KEEPTTL")
                        .query_async::<()>(&mut conn),
                )
                .await
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn_manager.clone();
        self.bounded("GET", conn.get::<_, Option<String>>(key)).await
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        self.bounded("DEL", conn.del::<_, ()>(key)).await
    }

    async fn healthy(&self) -> bool {
        let mut conn = self.conn_manager.clone();
        let cmd = redis::cmd("PING");
        let ping = cmd.query_async::<String>(&mut conn);

        matches!(
            tokio::time::timeout(self.ready_timeout, ping).await,
            Ok(Ok(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests require a running Redis instance
    // Run with: docker run -d -p 6379:6379 redis:7-alpine

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_set_get_del_roundtrip() {
        let store = RedisKvStore::connect(&RedisConfig::default()).await.unwrap();

        store.set("ussd:test:roundtrip", "value", Some(60)).await.unwrap();
        assert_eq!(
            store.get("ussd:test:roundtrip").await.unwrap(),
            Some("value".to_string())
        );

        store.del("ussd:test:roundtrip").await.unwrap();
        assert_eq!(store.get("ussd:test:roundtrip").await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_set_without_ttl_preserves_expiry() {
        let store = RedisKvStore::connect(&RedisConfig::default()).await.unwrap();

        store.set("ussd:test:keepttl", "one", Some(120)).await.unwrap();
        store.set("ussd:test:keepttl", "two", None).await.unwrap();

        let mut conn = store.conn_manager.clone();
        let ttl: i64 = redis::cmd("TTL")
            .arg("ussd:test:keepttl")
            .query_async(&mut conn)
            .await
            .unwrap();

        assert!(ttl > 0, "TTL should survive a SET without expiry, got {ttl}");
        assert_eq!(
            store.get("ussd:test:keepttl").await.unwrap(),
            Some("two".to_string())
        );

        store.del("ussd:test:keepttl").await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_healthy() {
        let store = RedisKvStore::connect(&RedisConfig::default()).await.unwrap();
        assert!(store.healthy().await);
    }
}
