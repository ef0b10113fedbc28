//! Session state types.
//!
//! A session is the persistent conversational state across USSD turns,
//! keyed by (MSISDN, session id, shortcode). The JSON encoding of these
//! types is the on-wire KV layout, so field names are stable camelCase.

mod store;

pub use store::SessionStore;

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════
// Keys
// ═══════════════════════════════════════════════════════════════════════

/// Composite session key.
///
/// Renders as `"{prefix}:{msisdn}:{sessionId}:{shortcode|default}"`; slot
/// keys and the `:start` anchor are derived suffixes of the same prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    prefix: String,
    msisdn: String,
    session_id: String,
    shortcode: Option<String>,
}

impl SessionKey {
    /// Build a key under the given store prefix.
    #[must_use]
    pub fn new(
        prefix: &str,
        msisdn: &str,
        session_id: &str,
        shortcode: Option<&str>,
    ) -> Self {
        Self {
            prefix: prefix.to_string(),
            msisdn: msisdn.to_string(),
            session_id: session_id.to_string(),
            shortcode: shortcode.filter(|s| !s.is_empty()).map(str::to_string),
        }
    }

    /// The caller's MSISDN.
    #[must_use]
    pub fn msisdn(&self) -> &str {
        &self.msisdn
    }

    /// The aggregator-assigned session identifier.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The dialled shortcode, if supplied.
    #[must_use]
    pub fn shortcode(&self) -> Option<&str> {
        self.shortcode.as_deref()
    }

    /// Key of the session blob.
    #[must_use]
    pub fn session_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.prefix,
            self.msisdn,
            self.session_id,
            self.shortcode.as_deref().unwrap_or("default")
        )
    }

    /// Key of the creation-time anchor.
    #[must_use]
    pub fn start_key(&self) -> String {
        format!("{}:start", self.session_key())
    }

    /// Key of a named slot.
    #[must_use]
    pub fn slot_key(&self, slot: &Slot) -> String {
        format!("{}:{}", self.session_key(), slot.name())
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.session_key())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Slots
// ═══════════════════════════════════════════════════════════════════════

/// Named auxiliary value attached to a session.
///
/// Slots hold transient workflow state (selected account, PIN attempt,
/// cached API responses) that must not pollute the session blob. The set
/// of names is closed so a typo cannot silently create a new slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Slot {
    /// PIN the caller entered on the login step.
    PinAttempt,
    /// Raw decoded LOGIN response, kept for later steps.
    LoginData,
    /// 1-indexed account chosen on the balance flow.
    BalanceSelectedAccount,
    /// Account chosen on the mini-statement flow.
    StatementAccount,
    /// Airtime purchase amount.
    AirtimeAmount,
    /// `own` or `other` recipient mode.
    AirtimeMode,
    /// Recipient MSISDN when buying for another number.
    AirtimeRecipient,
    /// Mobile network of the recipient.
    AirtimeNetwork,
    /// Merchant identifier for the airtime biller.
    AirtimeMerchant,
    /// Running per-day airtime aggregate.
    AirtimeDailyTotal,
    /// Transaction PIN captured for the current workflow.
    TransactionPin,
    /// Menu to return to after an interposed PIN step.
    PostLoginRedirect,
    /// Cached upstream envelope, keyed by the caller-chosen cache key.
    ApiCache(String),
}

impl Slot {
    /// Parse a configuration-supplied slot name.
    ///
    /// The slot set is closed; unknown names return `None` so a config
    /// typo cannot silently mint a new slot.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "pin_attempt" => Some(Self::PinAttempt),
            "loginData" => Some(Self::LoginData),
            "balance_selected_account" => Some(Self::BalanceSelectedAccount),
            "statement_account" => Some(Self::StatementAccount),
            "airtime_amount" => Some(Self::AirtimeAmount),
            "airtime_mode" => Some(Self::AirtimeMode),
            "airtime_recipient" => Some(Self::AirtimeRecipient),
            "network" => Some(Self::AirtimeNetwork),
            "merchantId" => Some(Self::AirtimeMerchant),
            "airtime_daily_total" => Some(Self::AirtimeDailyTotal),
            "transaction_pin" => Some(Self::TransactionPin),
            "post_login_redirect" => Some(Self::PostLoginRedirect),
            _ => name
                .strip_prefix("api_cache_")
                .map(|cache_key| Self::ApiCache(cache_key.to_string())),
        }
    }

    /// Slot name as it appears in the derived KV key.
    #[must_use]
    pub fn name(&self) -> Cow<'_, str> {
        match self {
            Self::PinAttempt => Cow::Borrowed("pin_attempt"),
            Self::LoginData => Cow::Borrowed("loginData"),
            Self::BalanceSelectedAccount => Cow::Borrowed("balance_selected_account"),
            Self::StatementAccount => Cow::Borrowed("statement_account"),
            Self::AirtimeAmount => Cow::Borrowed("airtime_amount"),
            Self::AirtimeMode => Cow::Borrowed("airtime_mode"),
            Self::AirtimeRecipient => Cow::Borrowed("airtime_recipient"),
            Self::AirtimeNetwork => Cow::Borrowed("network"),
            Self::AirtimeMerchant => Cow::Borrowed("merchantId"),
            Self::AirtimeDailyTotal => Cow::Borrowed("airtime_daily_total"),
            Self::TransactionPin => Cow::Borrowed("transaction_pin"),
            Self::PostLoginRedirect => Cow::Borrowed("post_login_redirect"),
            Self::ApiCache(cache_key) => Cow::Owned(format!("api_cache_{cache_key}")),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Session Record
// ═══════════════════════════════════════════════════════════════════════

/// Authentication state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    /// Caller has not yet presented a valid PIN.
    Pending,
    /// The last preceding upstream LOGIN succeeded.
    Authenticated,
}

/// Customer record cached from the initial `GETCUSTOMER` lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerData {
    /// Core-banking customer identifier, or `"GUEST"` before lookup
    /// succeeds.
    pub customer_id: String,

    /// First name.
    pub first_name: String,

    /// Last name.
    pub last_name: String,

    /// Preferred language code.
    pub language: String,

    /// Bank account identifiers, populated on successful login.
    #[serde(default)]
    pub accounts: Vec<String>,

    /// Account aliases.
    #[serde(default)]
    pub aliases: Vec<String>,

    /// National ID number, when the backend returns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_number: Option<String>,

    /// Email address, when the backend returns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl CustomerData {
    /// The fallback record used when the customer lookup fails.
    #[must_use]
    pub fn guest() -> Self {
        Self {
            customer_id: "GUEST".to_string(),
            first_name: "Customer".to_string(),
            last_name: String::new(),
            language: "en".to_string(),
            accounts: Vec::new(),
            aliases: Vec::new(),
            id_number: None,
            email: None,
        }
    }

    /// `true` if this is the guest fallback rather than a real lookup.
    #[must_use]
    pub fn is_guest(&self) -> bool {
        self.customer_id == "GUEST"
    }
}

/// Persistent cross-turn session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Name of the menu node the caller is on.
    pub current_menu: String,

    /// Previously visited menu names, in order.
    #[serde(default)]
    pub menu_history: Vec<String>,

    /// Customer record; absent until the first lookup completes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_data: Option<CustomerData>,

    /// Authentication state.
    pub auth_status: AuthStatus,

    /// Successful backend transactions within this session.
    #[serde(default)]
    pub transaction_count: u32,

    /// Session creation timestamp, formatted in the configured timezone.
    pub session_start: String,

    /// Last turn timestamp, formatted in the configured timezone.
    pub last_activity: String,

    /// Session end timestamp, set when the session terminates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_end: Option<String>,

    /// Monotonic anchor for elapsed-time computation. Never rewritten.
    pub created_at_millis: i64,

    /// Timestamp of the last successful backend transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transaction: Option<String>,
}

impl Session {
    /// `true` once the caller has authenticated.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.auth_status == AuthStatus::Authenticated
    }

    /// Accounts from the customer record, or an empty slice.
    #[must_use]
    pub fn accounts(&self) -> &[String] {
        self.customer_data
            .as_ref()
            .map_or(&[], |c| c.accounts.as_slice())
    }
}
