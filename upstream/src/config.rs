//! Upstream client configuration.

/// Configuration for the core-banking backend client.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL of the backend endpoint.
    pub base_url: String,

    /// Bank identifier sent as `BANKID`.
    pub bank_id: String,

    /// Bank name sent as `BANKNAME`.
    pub bank_name: String,

    /// Default shortcode when the request does not carry one.
    pub shortcode: String,

    /// Country code sent as `COUNTRY`.
    pub country: String,

    /// Transaction source sent as `TRXSOURCE`.
    ///
    /// Default: `USSD`
    pub trx_source: String,

    /// HTTP connect timeout in milliseconds.
    ///
    /// Default: 15000
    pub connect_timeout_ms: u64,

    /// Overall HTTP timeout in milliseconds.
    ///
    /// Default: 25000
    pub timeout_ms: u64,

    /// Lifetime of cached responses in seconds.
    ///
    /// Default: 300 (5 minutes)
    pub cache_ttl_seconds: i64,
}

impl UpstreamConfig {
    /// Create a configuration for the given backend URL.
    #[must_use]
    pub const fn new(base_url: String) -> Self {
        Self {
            base_url,
            bank_id: String::new(),
            bank_name: String::new(),
            shortcode: String::new(),
            country: String::new(),
            trx_source: String::new(),
            connect_timeout_ms: 15_000,
            timeout_ms: 25_000,
            cache_ttl_seconds: 300,
        }
    }

    /// Set the bank identity fields.
    #[must_use]
    pub fn with_bank(mut self, bank_id: String, bank_name: String) -> Self {
        self.bank_id = bank_id;
        self.bank_name = bank_name;
        self
    }

    /// Set the default shortcode.
    #[must_use]
    pub fn with_shortcode(mut self, shortcode: String) -> Self {
        self.shortcode = shortcode;
        self
    }

    /// Set the country code.
    #[must_use]
    pub fn with_country(mut self, country: String) -> Self {
        self.country = country;
        self
    }

    /// Set the transaction source.
    #[must_use]
    pub fn with_trx_source(mut self, trx_source: String) -> Self {
        self.trx_source = trx_source;
        self
    }

    /// Set the HTTP timeouts.
    #[must_use]
    pub const fn with_timeouts(mut self, connect_ms: u64, overall_ms: u64) -> Self {
        self.connect_timeout_ms = connect_ms;
        self.timeout_ms = overall_ms;
        self
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self::new("http://localhost:9090/api".to_string()).with_trx_source("USSD".to_string())
    }
}
