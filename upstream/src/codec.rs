//! Colon-tuple wire codec.
//!
//! The backend speaks a flat `KEY:VALUE:` tuple format in both directions.
//! Outbound requests are built from an ordered base populated from the
//! session and configuration, with caller-supplied tuples merged on top
//! (caller wins). Inbound responses are stripped of tag-like `<...>`
//! wrappers and split into alternating key/value pairs.
//!
//! Masking functions in this module exist for log emission only and must
//! never touch the wire.

use crate::config::UpstreamConfig;
use std::collections::BTreeMap;
use ussd_gateway_core::{Session, SessionKey};

/// Keys whose values are fully masked in logs.
const MASKED_KEYS: &[&str] = &[
    "OLDPIN", "NEWPIN", "TMPIN", "TRXMPIN", "LOGINMPIN", "PIN", "PASSWORD", "SECRET",
];

/// Keys whose values are partially masked in logs.
const PARTIAL_KEYS: &[&str] = &["MOBILENUMBER", "MSISDN", "ACCOUNTID"];

/// Parse a `KEY:VALUE:...` string into ordered pairs.
///
/// A trailing key without a value is kept with an empty value so the
/// caller-wins merge can still drop it.
#[must_use]
pub fn parse_tuples(raw: &str) -> Vec<(String, String)> {
    let fields: Vec<&str> = raw.split(':').map(str::trim).collect();
    let mut pairs = Vec::with_capacity(fields.len() / 2);

    let mut i = 0;
    while i < fields.len() {
        let key = fields[i];
        if key.is_empty() {
            i += 1;
            continue;
        }
        let value = fields.get(i + 1).copied().unwrap_or("");
        pairs.push((key.to_string(), value.to_string()));
        i += 2;
    }

    pairs
}

/// Merge caller pairs on top of the base, preserving base order.
///
/// Overridden keys keep their base position; caller-only keys append in
/// caller order. Pairs with empty values are dropped from the result.
#[must_use]
pub fn merge_pairs(
    base: Vec<(String, String)>,
    caller: Vec<(String, String)>,
) -> Vec<(String, String)> {
    let mut merged = base;

    for (key, value) in caller {
        match merged.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => merged.push((key, value)),
        }
    }

    merged.retain(|(_, v)| !v.is_empty());
    merged
}

/// Encode pairs as a flat `KEY:VALUE:` string.
#[must_use]
pub fn encode_pairs(pairs: &[(String, String)]) -> String {
    let mut out = String::new();
    for (key, value) in pairs {
        out.push_str(key);
        out.push(':');
        out.push_str(value);
        out.push(':');
    }
    out
}

/// Base request pairs populated from the session and configuration.
///
/// `DEVICEID` is the MSISDN concatenated with the effective shortcode;
/// `UNIQUEID` is a fresh 128-bit identifier in hyphenated hex form.
/// `CUSTOMERID` and `BANKACCOUNTS` are included once a real (non-guest)
/// customer is known.
#[must_use]
pub fn base_pairs(
    config: &UpstreamConfig,
    service: &str,
    key: &SessionKey,
    session: &Session,
) -> Vec<(String, String)> {
    let shortcode = key.shortcode().unwrap_or(&config.shortcode);

    let mut pairs = vec![
        ("FORMID".to_string(), service.to_string()),
        ("MOBILENUMBER".to_string(), key.msisdn().to_string()),
        ("SESSION".to_string(), key.session_id().to_string()),
        ("BANKID".to_string(), config.bank_id.clone()),
        ("BANKNAME".to_string(), config.bank_name.clone()),
        ("SHORTCODE".to_string(), shortcode.to_string()),
        ("COUNTRY".to_string(), config.country.clone()),
        ("TRXSOURCE".to_string(), config.trx_source.clone()),
        (
            "DEVICEID".to_string(),
            format!("{}{}", key.msisdn(), shortcode),
        ),
        ("UNIQUEID".to_string(), uuid::Uuid::new_v4().to_string()),
    ];

    if let Some(customer) = session.customer_data.as_ref().filter(|c| !c.is_guest()) {
        pairs.push(("CUSTOMERID".to_string(), customer.customer_id.clone()));
        if !customer.accounts.is_empty() {
            pairs.push(("BANKACCOUNTS".to_string(), customer.accounts.join(",")));
        }
    }

    pairs
}

/// Remove tag-like `<...>` wrappers from a response body.
#[must_use]
pub fn strip_tags(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_tag = false;

    for ch in raw.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }

    out.trim().to_string()
}

/// Decode a response body into a key/value map.
#[must_use]
pub fn decode_map(raw: &str) -> BTreeMap<String, String> {
    let stripped = strip_tags(raw);
    let fields: Vec<&str> = stripped.split(':').collect();

    let mut map = BTreeMap::new();
    let mut i = 0;
    while i + 1 < fields.len() {
        let key = fields[i].trim();
        if !key.is_empty() {
            map.insert(key.to_string(), fields[i + 1].trim().to_string());
        }
        i += 2;
    }

    map
}

/// Split a response body into positional fields.
///
/// The mini-statement response is consumed positionally rather than as a
/// map because transaction rows repeat the same keys.
#[must_use]
pub fn split_fields(raw: &str) -> Vec<String> {
    strip_tags(raw)
        .split(':')
        .map(|f| f.trim().to_string())
        .collect()
}

/// Map a failure status code to a human message.
#[must_use]
pub fn status_message(status: &str, fallback: &str) -> String {
    match status {
        "091" => "Invalid PIN".to_string(),
        "092" => "Account locked".to_string(),
        "093" => "Invalid account".to_string(),
        _ => fallback.to_string(),
    }
}

/// Mask a single value for log emission.
#[must_use]
pub fn mask_value(key: &str, value: &str) -> String {
    let upper = key.to_ascii_uppercase();

    if MASKED_KEYS.contains(&upper.as_str()) {
        return "[MASKED]".to_string();
    }

    if PARTIAL_KEYS.contains(&upper.as_str()) && value.len() >= 6 {
        let head = &value[..3];
        let tail = &value[value.len() - 3..];
        let stars = "*".repeat(value.len() - 6);
        return format!("{head}{stars}{tail}");
    }

    value.to_string()
}

/// Mask an encoded tuple string for log emission.
#[must_use]
pub fn mask_encoded(encoded: &str) -> String {
    let masked: Vec<(String, String)> = parse_tuples(encoded)
        .into_iter()
        .map(|(k, v)| {
            let masked = mask_value(&k, &v);
            (k, masked)
        })
        .collect();

    encode_pairs(&masked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ussd_gateway_core::{AuthStatus, CustomerData};

    fn session_with(customer: Option<CustomerData>) -> Session {
        Session {
            current_menu: "home".to_string(),
            menu_history: vec!["home".to_string()],
            customer_data: customer,
            auth_status: AuthStatus::Pending,
            transaction_count: 0,
            session_start: "2025-01-01 09:00:00".to_string(),
            last_activity: "2025-01-01 09:00:00".to_string(),
            session_end: None,
            created_at_millis: 0,
            last_transaction: None,
        }
    }

    fn test_config() -> UpstreamConfig {
        UpstreamConfig::new("http://elma.test/api".to_string())
            .with_bank("017".to_string(), "Sidian".to_string())
            .with_shortcode("527".to_string())
            .with_country("KE".to_string())
            .with_trx_source("USSD".to_string())
    }

    #[test]
    fn test_parse_encode_roundtrip() {
        let pairs = parse_tuples("FORMID:LOGIN:LOGINMPIN:1234:CUSTOMERID:C9:");
        assert_eq!(
            pairs,
            vec![
                ("FORMID".to_string(), "LOGIN".to_string()),
                ("LOGINMPIN".to_string(), "1234".to_string()),
                ("CUSTOMERID".to_string(), "C9".to_string()),
            ]
        );

        let encoded = encode_pairs(&pairs);
        assert_eq!(encoded, "FORMID:LOGIN:LOGINMPIN:1234:CUSTOMERID:C9:");
        assert_eq!(parse_tuples(&encoded), pairs);
    }

    #[test]
    fn test_merge_caller_wins_and_drops_empties() {
        let base = vec![
            ("FORMID".to_string(), "BASE".to_string()),
            ("COUNTRY".to_string(), "KE".to_string()),
            ("BANKID".to_string(), String::new()),
        ];
        let caller = vec![
            ("FORMID".to_string(), "LOGIN".to_string()),
            ("LOGINMPIN".to_string(), "1234".to_string()),
        ];

        let merged = merge_pairs(base, caller);
        assert_eq!(
            merged,
            vec![
                ("FORMID".to_string(), "LOGIN".to_string()),
                ("COUNTRY".to_string(), "KE".to_string()),
                ("LOGINMPIN".to_string(), "1234".to_string()),
            ]
        );
    }

    #[test]
    fn test_base_pairs_device_id_and_customer() {
        let key = SessionKey::new("ussd:session", "254700111222", "S1", Some("527"));
        let mut customer = CustomerData::guest();
        customer.customer_id = "C100".to_string();
        customer.accounts = vec!["0101".to_string(), "0102".to_string()];
        let session = session_with(Some(customer));

        let pairs = base_pairs(&test_config(), "LOGIN", &key, &session);
        let map: BTreeMap<_, _> = pairs.into_iter().collect();

        assert_eq!(map["FORMID"], "LOGIN");
        assert_eq!(map["DEVICEID"], "254700111222527");
        assert_eq!(map["CUSTOMERID"], "C100");
        assert_eq!(map["BANKACCOUNTS"], "0101,0102");
        // UNIQUEID is a hyphenated 128-bit identifier.
        assert_eq!(map["UNIQUEID"].len(), 36);
        assert_eq!(map["UNIQUEID"].matches('-').count(), 4);
    }

    #[test]
    fn test_base_pairs_guest_omits_customer() {
        let key = SessionKey::new("ussd:session", "254700111222", "S1", None);
        let session = session_with(Some(CustomerData::guest()));

        let pairs = base_pairs(&test_config(), "GETCUSTOMER", &key, &session);
        assert!(pairs.iter().all(|(k, _)| k != "CUSTOMERID"));
        assert!(pairs.iter().all(|(k, _)| k != "BANKACCOUNTS"));
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(
            strip_tags("<resp>STATUS:000:DATA:ok</resp>"),
            "STATUS:000:DATA:ok"
        );
        assert_eq!(strip_tags("STATUS:000:"), "STATUS:000:");
    }

    #[test]
    fn test_decode_map() {
        let map = decode_map("<r>STATUS:000:ACCOUNTS:0101-Main,0102-Savings:MESSAGE:Welcome</r>");
        assert_eq!(map["STATUS"], "000");
        assert_eq!(map["ACCOUNTS"], "0101-Main,0102-Savings");
        assert_eq!(map["MESSAGE"], "Welcome");
    }

    #[test]
    fn test_roundtrip_for_clean_map() {
        // For any map without empty values, parse(encode(m)) == m.
        let pairs = vec![
            ("STATUS".to_string(), "000".to_string()),
            ("DATA".to_string(), "hello".to_string()),
            ("CODE".to_string(), "X1".to_string()),
        ];
        assert_eq!(parse_tuples(&encode_pairs(&pairs)), pairs);
    }

    #[test]
    fn test_status_messages() {
        assert_eq!(status_message("091", "x"), "Invalid PIN");
        assert_eq!(status_message("092", "x"), "Account locked");
        assert_eq!(status_message("093", "x"), "Invalid account");
        assert_eq!(status_message("104", "backend says no"), "backend says no");
    }

    #[test]
    fn test_mask_pin_keys() {
        for key in ["LOGINMPIN", "OLDPIN", "NEWPIN", "TMPIN", "TRXMPIN", "PIN"] {
            assert_eq!(mask_value(key, "1234"), "[MASKED]", "{key} must be masked");
        }
    }

    #[test]
    fn test_mask_msisdn_partial() {
        assert_eq!(mask_value("MOBILENUMBER", "254700111222"), "254******222");
        assert_eq!(mask_value("ACCOUNTID", "0102030405"), "010****405");
        // Six digits: first three and last three with nothing between.
        assert_eq!(mask_value("MSISDN", "070011"), "070011");
    }

    #[test]
    fn test_mask_short_values_untouched() {
        assert_eq!(mask_value("MOBILENUMBER", "12345"), "12345");
        assert_eq!(mask_value("OTHERKEY", "254700111222"), "254700111222");
    }

    #[test]
    fn test_mask_encoded_string() {
        let masked = mask_encoded("FORMID:LOGIN:LOGINMPIN:9876:MOBILENUMBER:254700111222:");
        assert!(masked.contains("LOGINMPIN:[MASKED]:"));
        assert!(masked.contains("MOBILENUMBER:254******222:"));
        assert!(!masked.contains("9876"));
    }
}
