//! Upstream RPC client.
//!
//! Single-call client for the core-banking backend: builds the colon-tuple
//! request, issues an HTTP GET with bounded timeouts, decodes the response
//! into an [`UpstreamEnvelope`], and keeps a per-(MSISDN, session) response
//! cache in a session slot so repeated lookups within a turn sequence do
//! not hammer the backend.

use crate::codec::{
    base_pairs, decode_map, encode_pairs, mask_encoded, merge_pairs, parse_tuples, status_message,
    strip_tags,
};
use crate::config::UpstreamConfig;
use crate::envelope::{is_success_status, CachedEnvelope, UpstreamEnvelope};
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use ussd_gateway_core::{GatewayError, Result, Session, SessionKey, SessionStore, Slot};

/// Typed surface of the core-banking backend.
///
/// The default methods carry the literal request formats; implementors
/// only provide [`BankingApi::call`]. Action modules depend on this trait
/// so they can be exercised against a scripted mock.
#[async_trait]
pub trait BankingApi: Send + Sync {
    /// Issue one backend call.
    ///
    /// `data` is a `KEY:VALUE:...` string merged on top of the base pairs
    /// (caller wins). With a `cache_key` and no `force_refresh`, a cached
    /// envelope younger than the cache TTL is returned without a network
    /// round trip. Transport failures never error; they return the
    /// connection-error envelope.
    async fn call(
        &self,
        service: &str,
        data: &str,
        key: &SessionKey,
        session: &Session,
        cache_key: Option<&str>,
        force_refresh: bool,
    ) -> UpstreamEnvelope;

    /// Look up the customer record for the caller's MSISDN.
    async fn get_customer(&self, key: &SessionKey, session: &Session) -> UpstreamEnvelope {
        let data = format!("FORMID:GETCUSTOMER:MOBILENUMBER:{}:", key.msisdn());
        let cache_key = format!("customer_{}", key.msisdn());
        self.call("GETCUSTOMER", &data, key, session, Some(&cache_key), false)
            .await
    }

    /// Verify the caller's login PIN. Never cached.
    async fn login(&self, key: &SessionKey, session: &Session, pin: &str) -> UpstreamEnvelope {
        let customer_id = session
            .customer_data
            .as_ref()
            .map_or("", |c| c.customer_id.as_str());
        let data = format!("FORMID:LOGIN:LOGINMPIN:{pin}:CUSTOMERID:{customer_id}:");
        self.call("LOGIN", &data, key, session, None, false).await
    }

    /// Query the balance of one account. Never cached.
    async fn balance(&self, key: &SessionKey, session: &Session, account: &str) -> UpstreamEnvelope {
        let customer_id = session
            .customer_data
            .as_ref()
            .map_or("", |c| c.customer_id.as_str());
        let data = format!(
            "MERCHANTID:BALANCE:BANKACCOUNTID:{account}:CUSTOMERID:{customer_id}:MOBILENUMBER:{}:",
            key.msisdn()
        );
        self.call("B-", &data, key, session, None, false).await
    }

    /// Fetch the mini-statement for one account.
    async fn mini_statement(
        &self,
        key: &SessionKey,
        session: &Session,
        account: &str,
    ) -> UpstreamEnvelope {
        let customer_id = session
            .customer_data
            .as_ref()
            .map_or("", |c| c.customer_id.as_str());
        let data = format!(
            "FORMID:MINISTATEMENT:BANKACCOUNTID:{account}:CUSTOMERID:{customer_id}:MOBILENUMBER:{}:",
            key.msisdn()
        );
        self.call("MINISTATEMENT", &data, key, session, None, false)
            .await
    }

    /// Buy airtime through the paybill action.
    #[allow(clippy::too_many_arguments)]
    async fn airtime_purchase(
        &self,
        key: &SessionKey,
        session: &Session,
        merchant_id: &str,
        bank_account_id: &str,
        mobile_number: &str,
        amount: &str,
        pin: &str,
    ) -> UpstreamEnvelope {
        let data = format!(
            "FORMID:AIRTIME:ACTION:PAYBILL:MERCHANTID:{merchant_id}:BANKACCOUNTID:{bank_account_id}:MOBILENUMBER:{mobile_number}:AMOUNT:{amount}:TRXMPIN:{pin}:"
        );
        self.call("AIRTIME", &data, key, session, None, false).await
    }
}

/// Decode a raw response body into an envelope.
#[must_use]
pub fn decode_envelope(body: &str) -> UpstreamEnvelope {
    let raw = strip_tags(body);
    let data = decode_map(&raw);

    let status = data
        .get("STATUS")
        .cloned()
        .unwrap_or_else(|| "ERROR".to_string());
    let success = is_success_status(&status);

    let message = data
        .get("DATA")
        .or_else(|| data.get("MESSAGE"))
        .cloned()
        .unwrap_or_default();

    let error = if success {
        None
    } else {
        Some(status_message(&status, &message))
    };

    UpstreamEnvelope {
        success,
        status: status.clone(),
        code: status,
        data,
        raw,
        message: (!message.is_empty()).then_some(message),
        error,
        retry: false,
    }
}

/// HTTP client for the backend.
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    config: UpstreamConfig,
    sessions: SessionStore,
}

impl UpstreamClient {
    /// Build a client with the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the HTTP client cannot be
    /// constructed.
    pub fn new(config: UpstreamConfig, sessions: SessionStore) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| GatewayError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            config,
            sessions,
        })
    }

    async fn cached_envelope(
        &self,
        key: &SessionKey,
        cache_key: &str,
    ) -> Option<UpstreamEnvelope> {
        let slot = Slot::ApiCache(cache_key.to_string());
        let cached: CachedEnvelope = self.sessions.grab(key, &slot).await.ok()??;

        let age_millis = Utc::now().timestamp_millis() - cached.timestamp_millis;
        if age_millis <= self.config.cache_ttl_seconds * 1000 {
            tracing::debug!(session = %key, cache_key = cache_key, "Upstream cache hit");
            Some(cached.envelope)
        } else {
            None
        }
    }
}

#[async_trait]
impl BankingApi for UpstreamClient {
    async fn call(
        &self,
        service: &str,
        data: &str,
        key: &SessionKey,
        session: &Session,
        cache_key: Option<&str>,
        force_refresh: bool,
    ) -> UpstreamEnvelope {
        let cache_key = cache_key.filter(|c| !c.is_empty());

        if let Some(ck) = cache_key {
            if !force_refresh {
                if let Some(envelope) = self.cached_envelope(key, ck).await {
                    return envelope;
                }
            }
        }

        let base = base_pairs(&self.config, service, key, session);
        let caller = parse_tuples(data);
        let encoded = encode_pairs(&merge_pairs(base, caller));

        tracing::debug!(
            session = %key,
            service = service,
            request = %mask_encoded(&encoded),
            "Calling upstream"
        );

        let response = match self
            .http
            .get(&self.config.base_url)
            .query(&[("b", encoded.as_str())])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(session = %key, service = service, error = %e, "Upstream transport error");
                return UpstreamEnvelope::connection_error();
            }
        };

        // 5xx is a backend failure; 4xx bodies still carry a parseable
        // status tuple and are decoded normally.
        if response.status().is_server_error() {
            tracing::warn!(
                session = %key,
                service = service,
                http_status = %response.status(),
                "Upstream server error"
            );
            return UpstreamEnvelope::connection_error();
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(session = %key, service = service, error = %e, "Failed reading upstream body");
                return UpstreamEnvelope::connection_error();
            }
        };

        let envelope = decode_envelope(&body);

        tracing::debug!(
            session = %key,
            service = service,
            status = %envelope.status,
            response = %mask_encoded(&envelope.raw),
            "Upstream replied"
        );

        if envelope.success {
            if let Some(ck) = cache_key {
                let cached = CachedEnvelope {
                    envelope: envelope.clone(),
                    timestamp_millis: Utc::now().timestamp_millis(),
                };
                let slot = Slot::ApiCache(ck.to_string());
                if let Err(e) = self.sessions.store(key, &slot, &cached).await {
                    tracing::warn!(session = %key, cache_key = ck, error = %e, "Failed to cache envelope");
                }
            }
        }

        envelope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use ussd_gateway_core::{MemoryKvStore, SessionConfig};

    fn sessions() -> SessionStore {
        SessionStore::new(Arc::new(MemoryKvStore::new()), SessionConfig::default())
    }

    /// Client pointed at a port nothing listens on: transport always fails.
    fn unreachable_client(sessions: SessionStore) -> UpstreamClient {
        let config = UpstreamConfig::new("http://127.0.0.1:1/api".to_string())
            .with_timeouts(500, 1000);
        UpstreamClient::new(config, sessions).unwrap()
    }

    #[test]
    fn test_decode_envelope_success() {
        let envelope = decode_envelope("<r>STATUS:000:DATA:Welcome back</r>");
        assert!(envelope.success);
        assert_eq!(envelope.status, "000");
        assert_eq!(envelope.message.as_deref(), Some("Welcome back"));
        assert!(envelope.error.is_none());
    }

    #[test]
    fn test_decode_envelope_failure_maps_status() {
        let envelope = decode_envelope("STATUS:091:MESSAGE:denied");
        assert!(!envelope.success);
        assert_eq!(envelope.error.as_deref(), Some("Invalid PIN"));

        let passthrough = decode_envelope("STATUS:104:MESSAGE:Daily limit reached");
        assert_eq!(passthrough.error.as_deref(), Some("Daily limit reached"));
    }

    #[test]
    fn test_decode_envelope_prefers_data_over_message() {
        let envelope = decode_envelope("STATUS:000:MESSAGE:second:DATA:first");
        assert_eq!(envelope.message.as_deref(), Some("first"));
    }

    #[test]
    fn test_decode_envelope_without_status() {
        let envelope = decode_envelope("garbage");
        assert!(!envelope.success);
        assert_eq!(envelope.status, "ERROR");
    }

    #[tokio::test]
    async fn test_transport_error_returns_connection_envelope() {
        let sessions = sessions();
        let key = sessions.key("254700111222", "S1", Some("527"));
        let session = sessions.create(&key).await.unwrap();
        let client = unreachable_client(sessions);

        let envelope = client.call("LOGIN", "", &key, &session, None, false).await;
        assert_eq!(envelope.code, "API_CONNECTION_ERROR");
        assert!(envelope.retry);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let sessions = sessions();
        let key = sessions.key("254700111222", "S1", Some("527"));
        let session = sessions.create(&key).await.unwrap();

        // Seed the cache slot; the backend URL is unreachable, so any
        // network attempt would come back as a connection error.
        let cached = CachedEnvelope {
            envelope: decode_envelope("STATUS:000:DATA:cached"),
            timestamp_millis: Utc::now().timestamp_millis(),
        };
        sessions
            .store(&key, &Slot::ApiCache("customer_254700111222".to_string()), &cached)
            .await
            .unwrap();

        let client = unreachable_client(sessions);
        let envelope = client
            .call(
                "GETCUSTOMER",
                "",
                &key,
                &session,
                Some("customer_254700111222"),
                false,
            )
            .await;

        assert!(envelope.success);
        assert_eq!(envelope.message.as_deref(), Some("cached"));
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_cache() {
        let sessions = sessions();
        let key = sessions.key("254700111222", "S1", Some("527"));
        let session = sessions.create(&key).await.unwrap();

        let cached = CachedEnvelope {
            envelope: decode_envelope("STATUS:000:DATA:cached"),
            timestamp_millis: Utc::now().timestamp_millis(),
        };
        sessions
            .store(&key, &Slot::ApiCache("customer_254700111222".to_string()), &cached)
            .await
            .unwrap();

        let client = unreachable_client(sessions);
        let envelope = client
            .call(
                "GETCUSTOMER",
                "",
                &key,
                &session,
                Some("customer_254700111222"),
                true,
            )
            .await;

        assert_eq!(envelope.code, "API_CONNECTION_ERROR");
    }

    #[tokio::test]
    async fn test_stale_cache_is_ignored() {
        let sessions = sessions();
        let key = sessions.key("254700111222", "S1", Some("527"));
        let session = sessions.create(&key).await.unwrap();

        // Six minutes old: past the five-minute cache window.
        let cached = CachedEnvelope {
            envelope: decode_envelope("STATUS:000:DATA:stale"),
            timestamp_millis: Utc::now().timestamp_millis() - 360_000,
        };
        sessions
            .store(&key, &Slot::ApiCache("customer_254700111222".to_string()), &cached)
            .await
            .unwrap();

        let client = unreachable_client(sessions);
        let envelope = client
            .call(
                "GETCUSTOMER",
                "",
                &key,
                &session,
                Some("customer_254700111222"),
                false,
            )
            .await;

        assert_eq!(envelope.code, "API_CONNECTION_ERROR");
    }
}
