//! Router composition.

use crate::handlers::{health, ussd};
use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

/// Build the gateway router.
///
/// # Routes
///
/// - `POST /api/ussd` - one USSD turn
/// - `GET /health` - dependency health
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/ussd", post(ussd::handle_turn))
        .route("/health", get(health::health))
        .with_state(state)
}
