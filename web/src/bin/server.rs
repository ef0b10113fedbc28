//! USSD gateway HTTP server.

use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ussd_gateway_core::{RedisKvStore, SessionStore};
use ussd_gateway_engine::{HandlerRegistry, MenuEngine, MenuStore};
use ussd_gateway_modules::{register_all, BusinessRules};
use ussd_gateway_upstream::{BankingApi, UpstreamClient};
use ussd_gateway_web::{build_router, AppState, Config, UpstreamApiPort};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ussd_gateway=info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting USSD gateway");

    let config = Config::from_env();
    info!(
        redis_host = %config.redis.host,
        menu_dir = %config.app.menu_dir,
        upstream = %config.upstream.api_url,
        "Configuration loaded"
    );

    if config.app.disable_pin_decryption {
        info!("PIN transport decryption disabled (test scaffolding)");
    }

    info!("Connecting to Redis...");
    let kv = Arc::new(RedisKvStore::connect(&config.redis_config()).await?);
    info!("Redis connected");

    let sessions = SessionStore::new(kv, config.session_config());

    let api: Arc<dyn BankingApi> =
        Arc::new(UpstreamClient::new(config.upstream_config(), sessions.clone())?);

    let menus = MenuStore::load(&config.app.menu_dir)?;

    let rules = load_business_rules(&config.app.business_rules_file);

    let mut registry = HandlerRegistry::new();
    register_all(&mut registry, &sessions, &api, &rules);
    info!(handlers = registry.len(), "Action modules registered");

    let engine = MenuEngine::new(menus, registry, sessions.clone())
        .with_api(Arc::new(UpstreamApiPort::new(Arc::clone(&api))));

    let state = Arc::new(AppState::new(sessions, engine, api));
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Load business rules, falling back to defaults when the file is missing
/// or invalid.
fn load_business_rules(path: &str) -> BusinessRules {
    match std::fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(rules) => rules,
            Err(e) => {
                tracing::warn!(file = path, error = %e, "Invalid business rules; using defaults");
                BusinessRules::default()
            }
        },
        Err(e) => {
            tracing::warn!(file = path, error = %e, "No business rules file; using defaults");
            BusinessRules::default()
        }
    }
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
