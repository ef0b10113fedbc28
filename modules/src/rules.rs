//! Business rules consumed by the action modules.
//!
//! Parsed from `business-rules.json`; the modules receive the typed rules,
//! never the file.

use serde::{Deserialize, Serialize};

/// Airtime purchase limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirtimeRules {
    /// Minimum purchase amount.
    #[serde(default = "default_min_amount")]
    pub min_amount: f64,

    /// Maximum single purchase amount.
    #[serde(default = "default_max_amount")]
    pub max_amount: f64,

    /// Maximum aggregate per day.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: f64,
}

const fn default_min_amount() -> f64 {
    10.0
}

const fn default_max_amount() -> f64 {
    5000.0
}

const fn default_daily_limit() -> f64 {
    10_000.0
}

impl Default for AirtimeRules {
    fn default() -> Self {
        Self {
            min_amount: default_min_amount(),
            max_amount: default_max_amount(),
            daily_limit: default_daily_limit(),
        }
    }
}

/// Root of `business-rules.json`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessRules {
    /// Airtime limits.
    #[serde(default)]
    pub airtime: AirtimeRules,
}
