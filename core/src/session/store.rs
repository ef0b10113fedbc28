//! Session store over the key/value adapter.
//!
//! Persists the session blob as JSON under the composite key, a `:start`
//! anchor holding the creation millis, and JSON slot payloads under
//! derived keys. Every write carries the configured TTL; a `get` refreshes
//! the blob's TTL but never touches the anchor, so elapsed-time checks
//! always measure from true session creation.
//!
//! There is no cross-process locking: last writer wins at the granularity
//! of the whole blob. Multi-step workflow state therefore goes into slots,
//! which are single-writer per step.

use crate::config::SessionConfig;
use crate::error::{GatewayError, Result};
use crate::kv::KvStore;
use crate::session::{AuthStatus, Session, SessionKey, Slot};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Session store keyed by (MSISDN, session id, shortcode).
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KvStore>,
    config: SessionConfig,
}

impl SessionStore {
    /// Create a store over the given KV adapter.
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>, config: SessionConfig) -> Self {
        Self { kv, config }
    }

    /// The store configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Build the composite key for a triple under this store's prefix.
    #[must_use]
    pub fn key(&self, msisdn: &str, session_id: &str, shortcode: Option<&str>) -> SessionKey {
        SessionKey::new(&self.config.prefix, msisdn, session_id, shortcode)
    }

    /// Current wall time formatted in the configured timezone.
    #[must_use]
    pub fn now_stamp(&self) -> String {
        Utc::now()
            .with_timezone(&self.config.timezone)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }

    /// Create a fresh session record and its `:start` anchor.
    ///
    /// Overwrites any existing record under the same key: the aggregator
    /// chooses a new session id for every new call, so a collision means a
    /// stale record.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unavailable`] if the KV cluster is down.
    pub async fn create(&self, key: &SessionKey) -> Result<Session> {
        let now_millis = Utc::now().timestamp_millis();
        let stamp = self.now_stamp();

        let session = Session {
            current_menu: "home".to_string(),
            menu_history: vec!["home".to_string()],
            customer_data: None,
            auth_status: AuthStatus::Pending,
            transaction_count: 0,
            session_start: stamp.clone(),
            last_activity: stamp,
            session_end: None,
            created_at_millis: now_millis,
            last_transaction: None,
        };

        let blob = serde_json::to_string(&session)?;
        let ttl = Some(self.config.ttl_seconds);

        self.kv.set(&key.session_key(), &blob, ttl).await?;
        self.kv
            .set(&key.start_key(), &now_millis.to_string(), ttl)
            .await?;

        tracing::info!(
            session = %key,
            ttl_seconds = self.config.ttl_seconds,
            "Created session"
        );

        Ok(session)
    }

    /// Fetch the session, refreshing its TTL on a hit.
    ///
    /// The `:start` anchor is left untouched so expiry checks measure from
    /// creation, not from the last turn.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unavailable`] if the KV cluster is down.
    pub async fn get(&self, key: &SessionKey) -> Result<Option<Session>> {
        let Some(blob) = self.kv.get(&key.session_key()).await? else {
            return Ok(None);
        };

        let session: Session = match serde_json::from_str(&blob) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(session = %key, error = %e, "Discarding unparseable session blob");
                return Ok(None);
            }
        };

        self.kv
            .set(&key.session_key(), &blob, Some(self.config.ttl_seconds))
            .await?;

        Ok(Some(session))
    }

    /// Deep-merge a patch into the session and write it back.
    ///
    /// Objects merge recursively; arrays and scalars in the patch replace.
    /// `lastActivity` is refreshed and `createdAtMillis` is preserved
    /// regardless of the patch contents.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::SessionNotFound`] if no record exists, or
    /// [`GatewayError::Unavailable`] if the KV cluster is down.
    pub async fn update(&self, key: &SessionKey, patch: &Value) -> Result<Session> {
        let session = self
            .get(key)
            .await?
            .ok_or(GatewayError::SessionNotFound)?;

        let created_at_millis = session.created_at_millis;
        let mut merged = serde_json::to_value(&session)?;
        deep_merge(&mut merged, patch);

        merged["lastActivity"] = Value::String(self.now_stamp());
        merged["createdAtMillis"] = Value::from(created_at_millis);

        let updated: Session = serde_json::from_value(merged)?;
        let blob = serde_json::to_string(&updated)?;

        self.kv
            .set(&key.session_key(), &blob, Some(self.config.ttl_seconds))
            .await?;

        tracing::debug!(session = %key, "Updated session");

        Ok(updated)
    }

    /// Put a slot value, serialized as JSON with the session TTL.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unavailable`] if the KV cluster is down.
    pub async fn store<T: Serialize + ?Sized>(
        &self,
        key: &SessionKey,
        slot: &Slot,
        value: &T,
    ) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        self.kv
            .set(&key.slot_key(slot), &payload, Some(self.config.ttl_seconds))
            .await
    }

    /// Fetch a typed slot value, or `None` if absent or unparseable.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unavailable`] if the KV cluster is down.
    pub async fn grab<T: DeserializeOwned>(
        &self,
        key: &SessionKey,
        slot: &Slot,
    ) -> Result<Option<T>> {
        let Some(payload) = self.kv.get(&key.slot_key(slot)).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&payload) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(
                    session = %key,
                    slot = %slot.name(),
                    error = %e,
                    "Discarding unparseable slot payload"
                );
                Ok(None)
            }
        }
    }

    /// `true` if the slot holds a value.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unavailable`] if the KV cluster is down.
    pub async fn possess(&self, key: &SessionKey, slot: &Slot) -> Result<bool> {
        Ok(self.kv.get(&key.slot_key(slot)).await?.is_some())
    }

    /// Delete one or more slots.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unavailable`] if the KV cluster is down.
    pub async fn blank(&self, key: &SessionKey, slots: &[Slot]) -> Result<()> {
        for slot in slots {
            self.kv.del(&key.slot_key(slot)).await?;
        }
        Ok(())
    }

    /// Delete the session blob and the `:start` anchor.
    ///
    /// Slots are left to expire by TTL.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unavailable`] if the KV cluster is down.
    pub async fn clear(&self, key: &SessionKey) -> Result<()> {
        self.kv.del(&key.session_key()).await?;
        self.kv.del(&key.start_key()).await?;

        tracing::info!(session = %key, "Cleared session");
        Ok(())
    }

    /// Wall-clock seconds since session creation, or 0 without an anchor.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unavailable`] if the KV cluster is down.
    pub async fn elapsed_seconds(&self, key: &SessionKey) -> Result<i64> {
        let Some(raw) = self.kv.get(&key.start_key()).await? else {
            return Ok(0);
        };

        let Ok(start_millis) = raw.parse::<i64>() else {
            tracing::warn!(session = %key, raw = %raw, "Unparseable start anchor");
            return Ok(0);
        };

        Ok((Utc::now().timestamp_millis() - start_millis) / 1000)
    }

    /// Increment the transaction counter and stamp the last transaction.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::SessionNotFound`] if no record exists, or
    /// [`GatewayError::Unavailable`] if the KV cluster is down.
    pub async fn increment_transaction_count(&self, key: &SessionKey) -> Result<Session> {
        let session = self
            .get(key)
            .await?
            .ok_or(GatewayError::SessionNotFound)?;

        let patch = serde_json::json!({
            "transactionCount": session.transaction_count + 1,
            "lastTransaction": self.now_stamp(),
        });

        self.update(key, &patch).await
    }

    /// Probe the underlying store.
    pub async fn healthy(&self) -> bool {
        self.kv.healthy().await
    }
}

/// Recursively merge `patch` into `base`.
///
/// Objects merge key by key; arrays and scalars in the patch replace the
/// base value wholesale.
fn deep_merge(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                match base_map.get_mut(key) {
                    Some(base_value) if base_value.is_object() && patch_value.is_object() => {
                        deep_merge(base_value, patch_value);
                    }
                    _ => {
                        base_map.insert(key.clone(), patch_value.clone());
                    }
                }
            }
        }
        (base_slot, _) => {
            *base_slot = patch.clone();
        }
    }
}
