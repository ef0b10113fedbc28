//! Input validation rules and transforms.

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Declarative validation rule from a node's `inputConfig`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidationRule {
    /// Mobile number, optionally restricted to one network.
    Msisdn {
        /// Network qualifier: `safaricom`, `airtel` or `telkom`.
        #[serde(default)]
        network: Option<String>,
    },

    /// Monetary amount with optional bounds.
    Amount {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },

    /// Calendar date; not in the future and at most ten years old.
    Date {
        /// Pattern such as `DDMMYYYY` (the default).
        #[serde(default = "default_date_format")]
        format: String,
    },

    /// 4–6 digit PIN.
    Pin,

    /// Membership in an allowed list.
    #[serde(rename = "option")]
    Choice {
        /// Accepted inputs.
        allowed: Vec<String>,
    },

    /// The literal `"1"` or a valid PIN.
    PinOrOption,

    /// Delegates to a registered handler; the engine resolves it.
    Custom {
        /// Registered handler name.
        handler: String,
    },
}

fn default_date_format() -> String {
    "DDMMYYYY".to_string()
}

/// Input transform from a node's `inputConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transform {
    /// Local `07…`/`01…` form to international `254…`.
    #[serde(rename = "msisdn_to_254")]
    MsisdnTo254,

    /// International `254…` form to local `0…`.
    #[serde(rename = "msisdn_to_0")]
    MsisdnTo0,

    /// Uppercase the input.
    #[serde(rename = "uppercase")]
    Uppercase,

    /// Lowercase the input.
    #[serde(rename = "lowercase")]
    Lowercase,
}

/// Apply a transform to an input.
#[must_use]
pub fn apply_transform(transform: Transform, input: &str) -> String {
    match transform {
        Transform::MsisdnTo254 => {
            if input.len() == 10 && input.starts_with('0') {
                format!("254{}", &input[1..])
            } else if let Some(rest) = input.strip_prefix("+254") {
                format!("254{rest}")
            } else {
                input.to_string()
            }
        }
        Transform::MsisdnTo0 => {
            if input.len() == 12 && input.starts_with("254") {
                format!("0{}", &input[3..])
            } else {
                input.to_string()
            }
        }
        Transform::Uppercase => input.to_uppercase(),
        Transform::Lowercase => input.to_lowercase(),
    }
}

/// `true` for a 4–6 digit ASCII PIN.
#[must_use]
pub fn is_valid_pin(input: &str) -> bool {
    (4..=6).contains(&input.len()) && input.bytes().all(|b| b.is_ascii_digit())
}

/// `true` for an accepted local-form MSISDN: ten digits starting `07` or
/// `01`, optionally restricted to one network's prefixes.
#[must_use]
pub fn is_valid_msisdn(input: &str, network: Option<&str>) -> bool {
    if input.len() != 10 || !input.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    match network.map(str::to_ascii_lowercase).as_deref() {
        Some("safaricom" | "telkom") => input.starts_with("07"),
        Some("airtel") => input.starts_with("07") || input.starts_with("01"),
        _ => input.starts_with("07") || input.starts_with("01"),
    }
}

/// Validate an input against a rule.
///
/// [`ValidationRule::Custom`] always passes here; the engine dispatches it
/// to the registered handler instead.
///
/// # Errors
///
/// Returns the user-facing message on failure.
pub fn validate(rule: &ValidationRule, input: &str) -> Result<(), String> {
    match rule {
        ValidationRule::Msisdn { network } => {
            if is_valid_msisdn(input, network.as_deref()) {
                Ok(())
            } else {
                Err("Invalid mobile number. Please try again.".to_string())
            }
        }
        ValidationRule::Amount { min, max } => {
            let amount: f64 = input
                .trim()
                .parse()
                .map_err(|_| "Invalid amount. Please enter a number.".to_string())?;

            if let Some(min) = min {
                if amount < *min {
                    return Err(format!("Minimum amount is {min}."));
                }
            }
            if let Some(max) = max {
                if amount > *max {
                    return Err(format!("Maximum amount is {max}."));
                }
            }
            Ok(())
        }
        ValidationRule::Date { format } => validate_date(input, format),
        ValidationRule::Pin => {
            if is_valid_pin(input) {
                Ok(())
            } else {
                Err("PIN must be 4 to 6 digits.".to_string())
            }
        }
        ValidationRule::Choice { allowed } => {
            if allowed.iter().any(|a| a == input) {
                Ok(())
            } else {
                Err("Invalid selection. Please try again.".to_string())
            }
        }
        ValidationRule::PinOrOption => {
            if input == "1" || is_valid_pin(input) {
                Ok(())
            } else {
                Err("Please enter your PIN, or 1 to reset it.".to_string())
            }
        }
        ValidationRule::Custom { .. } => Ok(()),
    }
}

fn validate_date(input: &str, format: &str) -> Result<(), String> {
    let pattern = format
        .replace("DD", "%d")
        .replace("MM", "%m")
        .replace("YYYY", "%Y");

    let date = NaiveDate::parse_from_str(input, &pattern)
        .map_err(|_| format!("Invalid date. Use the format {format}."))?;

    let today = Utc::now().date_naive();
    if date > today {
        return Err("Date cannot be in the future.".to_string());
    }
    if date < today - Duration::days(3653) {
        return Err("Date cannot be more than 10 years ago.".to_string());
    }

    Ok(())
}
