//! Configuration for the session store and KV adapter.
//!
//! Configuration values are provided by the application after parsing the
//! environment; nothing in this crate reads environment variables itself.

use chrono_tz::Tz;

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis host.
    pub host: String,

    /// Redis port.
    pub port: u16,

    /// Optional password.
    pub password: Option<String>,

    /// Maximum time to wait for the cluster to become ready before an
    /// operation fails.
    ///
    /// Default: 10 seconds
    pub ready_timeout_seconds: u64,
}

impl RedisConfig {
    /// Create a new Redis configuration for the given host and port.
    #[must_use]
    pub const fn new(host: String, port: u16) -> Self {
        Self {
            host,
            port,
            password: None,
            ready_timeout_seconds: 10,
        }
    }

    /// Set the password.
    #[must_use]
    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    /// Set the readiness bound.
    #[must_use]
    pub const fn with_ready_timeout(mut self, seconds: u64) -> Self {
        self.ready_timeout_seconds = seconds;
        self
    }

    /// Build the connection URL.
    #[must_use]
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) if !password.is_empty() => {
                format!("redis://:{password}@{}:{}", self.host, self.port)
            }
            _ => format!("redis://{}:{}", self.host, self.port),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self::new("127.0.0.1".to_string(), 6379)
    }
}

/// Session store configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Key prefix for all session records.
    ///
    /// Default: `ussd:session`
    pub prefix: String,

    /// Session time-to-live in seconds.
    ///
    /// Default: 300
    pub ttl_seconds: u64,

    /// Timezone used when formatting session timestamps.
    ///
    /// Default: `Africa/Nairobi`
    pub timezone: Tz,
}

impl SessionConfig {
    /// Create a session configuration with the given key prefix.
    #[must_use]
    pub const fn new(prefix: String) -> Self {
        Self {
            prefix,
            ttl_seconds: 300,
            timezone: chrono_tz::Africa::Nairobi,
        }
    }

    /// Set the session TTL.
    #[must_use]
    pub const fn with_ttl(mut self, seconds: u64) -> Self {
        self.ttl_seconds = seconds;
        self
    }

    /// Set the timestamp timezone.
    #[must_use]
    pub const fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new("ussd:session".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_url_without_password() {
        let config = RedisConfig::new("redis.internal".to_string(), 6380);
        assert_eq!(config.url(), "redis://redis.internal:6380");
    }

    #[test]
    fn test_redis_url_with_password() {
        let config = RedisConfig::default().with_password(Some("s3cret".to_string()));
        assert_eq!(config.url(), "redis://:s3cret@127.0.0.1:6379");
    }

    #[test]
    fn test_empty_password_is_ignored() {
        let config = RedisConfig::default().with_password(Some(String::new()));
        assert_eq!(config.url(), "redis://127.0.0.1:6379");
    }

    #[test]
    fn test_session_config_builder() {
        let config = SessionConfig::new("ussd:session".to_string())
            .with_ttl(600)
            .with_timezone(chrono_tz::Africa::Lagos);

        assert_eq!(config.ttl_seconds, 600);
        assert_eq!(config.timezone, chrono_tz::Africa::Lagos);
    }

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.prefix, "ussd:session");
        assert_eq!(config.ttl_seconds, 300);
        assert_eq!(config.timezone, chrono_tz::Africa::Nairobi);
    }
}
