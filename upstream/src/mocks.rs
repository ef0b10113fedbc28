//! Mock banking API for testing.

use crate::client::BankingApi;
use crate::envelope::UpstreamEnvelope;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use ussd_gateway_core::{Session, SessionKey};

/// One recorded [`BankingApi::call`] invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// Service name of the call.
    pub service: String,
    /// Caller-supplied data string.
    pub data: String,
    /// MSISDN of the session key.
    pub msisdn: String,
    /// Cache key, if any.
    pub cache_key: Option<String>,
}

/// Scripted mock of the [`BankingApi`].
///
/// Responses are queued per service name; each call pops the next one.
/// An un-scripted service returns the connection-error envelope.
#[derive(Debug, Clone, Default)]
pub struct MockBankingApi {
    responses: Arc<Mutex<HashMap<String, VecDeque<UpstreamEnvelope>>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockBankingApi {
    /// Create an empty mock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for a service.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn enqueue(&self, service: &str, envelope: UpstreamEnvelope) {
        self.responses
            .lock()
            .expect("mock lock poisoned")
            .entry(service.to_string())
            .or_default()
            .push_back(envelope);
    }

    /// All calls recorded so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("mock lock poisoned").clone()
    }

    /// Number of calls made to one service.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn call_count(&self, service: &str) -> usize {
        self.calls
            .lock()
            .expect("mock lock poisoned")
            .iter()
            .filter(|c| c.service == service)
            .count()
    }
}

#[async_trait]
impl BankingApi for MockBankingApi {
    async fn call(
        &self,
        service: &str,
        data: &str,
        key: &SessionKey,
        _session: &Session,
        cache_key: Option<&str>,
        _force_refresh: bool,
    ) -> UpstreamEnvelope {
        self.calls.lock().expect("mock lock poisoned").push(RecordedCall {
            service: service.to_string(),
            data: data.to_string(),
            msisdn: key.msisdn().to_string(),
            cache_key: cache_key.map(str::to_string),
        });

        self.responses
            .lock()
            .expect("mock lock poisoned")
            .get_mut(service)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(UpstreamEnvelope::connection_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::decode_envelope;
    use std::sync::Arc as StdArc;
    use ussd_gateway_core::{MemoryKvStore, SessionConfig, SessionStore};

    #[tokio::test]
    async fn test_mock_scripting_and_recording() {
        let sessions =
            SessionStore::new(StdArc::new(MemoryKvStore::new()), SessionConfig::default());
        let key = sessions.key("254700111222", "S1", Some("527"));
        let session = sessions.create(&key).await.unwrap();

        let mock = MockBankingApi::new();
        mock.enqueue("LOGIN", decode_envelope("STATUS:000:ACCOUNTS:0101:"));

        let envelope = mock.login(&key, &session, "1234").await;
        assert!(envelope.success);

        let second = mock.login(&key, &session, "1234").await;
        assert_eq!(second.code, "API_CONNECTION_ERROR");

        assert_eq!(mock.call_count("LOGIN"), 2);
        assert!(mock.calls()[0].data.contains("LOGINMPIN:1234"));
    }
}
