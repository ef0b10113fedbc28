//! Gateway configuration.
//!
//! Loads configuration from environment variables with sensible defaults,
//! plus the on-disk `api-endpoints.json` override.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use ussd_gateway_core::{RedisConfig, SessionConfig};
use ussd_gateway_upstream::UpstreamConfig;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Redis/session configuration.
    pub redis: RedisSettings,
    /// Upstream backend configuration.
    pub upstream: UpstreamSettings,
    /// Application-level settings.
    pub app: AppSettings,
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
}

/// Redis and session settings.
#[derive(Debug, Clone)]
pub struct RedisSettings {
    /// Redis host.
    pub host: String,
    /// Redis port.
    pub port: u16,
    /// Optional password.
    pub password: Option<String>,
    /// Session TTL in seconds.
    pub ttl_seconds: u64,
    /// Session key prefix.
    pub session_prefix: String,
}

/// Upstream backend settings.
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    /// Backend URL.
    pub api_url: String,
    /// Overall timeout in milliseconds.
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Bank identifier.
    pub bank_id: String,
    /// Bank display name.
    pub bank_name: String,
    /// Default shortcode.
    pub shortcode: String,
    /// Country code.
    pub country: String,
    /// Transaction source tag.
    pub trx_source: String,
}

/// Application-level settings.
#[derive(Debug, Clone)]
pub struct AppSettings {
    /// Timezone for session timestamps.
    pub timezone: String,
    /// Directory of per-menu JSON files.
    pub menu_dir: String,
    /// Path to `api-endpoints.json`.
    pub api_endpoints_file: String,
    /// Path to `business-rules.json`.
    pub business_rules_file: String,
    /// Test scaffolding: skip PIN transport decryption.
    pub disable_pin_decryption: bool,
    /// Transport encryption key (held for upstream components).
    pub encryption_key: Option<String>,
    /// Transport IV (held for upstream components).
    pub iv_key: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3000),
            },
            redis: RedisSettings {
                host: env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: env::var("REDIS_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(6379),
                password: env::var("REDIS_PASSWORD").ok().filter(|p| !p.is_empty()),
                ttl_seconds: env::var("REDIS_TTL")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
                session_prefix: env::var("REDIS_SESSION_PREFIX")
                    .unwrap_or_else(|_| "ussd:session".to_string()),
            },
            upstream: UpstreamSettings {
                api_url: env::var("ELMA_API_URL")
                    .unwrap_or_else(|_| "http://localhost:9090/api".to_string()),
                timeout_ms: env::var("API_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(25_000),
                connect_timeout_ms: env::var("API_CONNECT_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(15_000),
                bank_id: env::var("BANK_ID").unwrap_or_default(),
                bank_name: env::var("BANK_NAME").unwrap_or_default(),
                shortcode: env::var("ELMA_SHORTCODE").unwrap_or_default(),
                country: env::var("COUNTRY").unwrap_or_else(|_| "KE".to_string()),
                trx_source: env::var("TRX_SOURCE").unwrap_or_else(|_| "USSD".to_string()),
            },
            app: AppSettings {
                timezone: env::var("TIMEZONE").unwrap_or_else(|_| "Africa/Nairobi".to_string()),
                menu_dir: env::var("MENU_CONFIG_DIR").unwrap_or_else(|_| "config/menus".to_string()),
                api_endpoints_file: env::var("API_ENDPOINTS_FILE")
                    .unwrap_or_else(|_| "config/api-endpoints.json".to_string()),
                business_rules_file: env::var("BUSINESS_RULES_FILE")
                    .unwrap_or_else(|_| "config/business-rules.json".to_string()),
                disable_pin_decryption: env::var("DISABLE_PIN_DECRYPTION")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(false),
                encryption_key: env::var("ENCRYPTION_KEY").ok(),
                iv_key: env::var("IV_KEY").ok(),
            },
        }
    }

    /// Derived Redis adapter configuration.
    #[must_use]
    pub fn redis_config(&self) -> RedisConfig {
        RedisConfig::new(self.redis.host.clone(), self.redis.port)
            .with_password(self.redis.password.clone())
    }

    /// Derived session store configuration.
    ///
    /// An unknown timezone name falls back to `Africa/Nairobi` with a
    /// warning rather than failing startup.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        let timezone = self.app.timezone.parse().unwrap_or_else(|_| {
            tracing::warn!(timezone = %self.app.timezone, "Unknown timezone; using Africa/Nairobi");
            chrono_tz::Africa::Nairobi
        });

        SessionConfig::new(self.redis.session_prefix.clone())
            .with_ttl(self.redis.ttl_seconds)
            .with_timezone(timezone)
    }

    /// Derived upstream client configuration, honouring any base-URL
    /// override in `api-endpoints.json`.
    #[must_use]
    pub fn upstream_config(&self) -> UpstreamConfig {
        let base_url = ApiEndpoints::load(Path::new(&self.app.api_endpoints_file))
            .and_then(|e| e.base_url)
            .unwrap_or_else(|| self.upstream.api_url.clone());

        UpstreamConfig::new(base_url)
            .with_bank(self.upstream.bank_id.clone(), self.upstream.bank_name.clone())
            .with_shortcode(self.upstream.shortcode.clone())
            .with_country(self.upstream.country.clone())
            .with_trx_source(self.upstream.trx_source.clone())
            .with_timeouts(self.upstream.connect_timeout_ms, self.upstream.timeout_ms)
    }
}

/// Parsed `api-endpoints.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEndpoints {
    /// Base URL override; `null` defers to `ELMA_API_URL`.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Logical service name → upstream form id.
    #[serde(default)]
    pub services: BTreeMap<String, String>,
}

impl ApiEndpoints {
    /// Load the file if it exists and parses; `None` otherwise.
    #[must_use]
    pub fn load(path: &Path) -> Option<Self> {
        let raw = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(endpoints) => Some(endpoints),
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Ignoring invalid api-endpoints file");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        // Environment-free defaults; avoid touching real env vars.
        let config = Config::from_env();
        assert_eq!(config.redis.session_prefix, "ussd:session");
        assert!(config.redis.ttl_seconds >= 1);
        assert_eq!(config.upstream.trx_source, "USSD");
    }

    #[test]
    fn test_api_endpoints_parse() {
        let endpoints: ApiEndpoints = serde_json::from_str(
            r#"{"baseUrl": "http://elma.internal/api", "services": {"login": "LOGIN"}}"#,
        )
        .unwrap();
        assert_eq!(endpoints.base_url.as_deref(), Some("http://elma.internal/api"));
        assert_eq!(endpoints.services.get("login").map(String::as_str), Some("LOGIN"));
    }

    #[test]
    fn test_session_config_timezone_fallback() {
        let mut config = Config::from_env();
        config.app.timezone = "Not/AZone".to_string();
        assert_eq!(config.session_config().timezone, chrono_tz::Africa::Nairobi);
    }
}
