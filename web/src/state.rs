//! Shared application state.

use std::sync::Arc;
use ussd_gateway_core::SessionStore;
use ussd_gateway_engine::MenuEngine;
use ussd_gateway_upstream::BankingApi;

/// State shared by all request handlers.
pub struct AppState {
    /// Session store over the KV cluster.
    pub sessions: SessionStore,

    /// The menu engine.
    pub engine: MenuEngine,

    /// Upstream banking API.
    pub api: Arc<dyn BankingApi>,
}

impl AppState {
    /// Assemble the application state.
    #[must_use]
    pub fn new(sessions: SessionStore, engine: MenuEngine, api: Arc<dyn BankingApi>) -> Self {
        Self {
            sessions,
            engine,
            api,
        }
    }
}
