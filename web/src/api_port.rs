//! Adapter exposing the upstream client to the menu engine.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use ussd_gateway_core::{Session, SessionKey};
use ussd_gateway_engine::ApiPort;
use ussd_gateway_upstream::BankingApi;

/// [`ApiPort`] over the [`BankingApi`], for declarative `api_call`
/// actions in menu files.
pub struct UpstreamApiPort {
    api: Arc<dyn BankingApi>,
}

impl UpstreamApiPort {
    /// Wrap a banking API.
    #[must_use]
    pub fn new(api: Arc<dyn BankingApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ApiPort for UpstreamApiPort {
    async fn call(&self, service: &str, data: &str, key: &SessionKey, session: &Session) -> Value {
        let envelope = self.api.call(service, data, key, session, None, false).await;
        serde_json::to_value(&envelope).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to serialize upstream envelope");
            serde_json::json!({"success": false})
        })
    }
}
