//! Airtime module: confirmation, limits and purchase.

use crate::rules::AirtimeRules;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use ussd_gateway_core::{Result, SessionStore, Slot};
use ussd_gateway_engine::{is_valid_msisdn, ActionHandler, StepResult, Turn};
use ussd_gateway_upstream::BankingApi;

/// Handles the airtime confirmation step.
///
/// By the time this runs, earlier menus have filled the network, merchant,
/// amount and mode slots; this handler validates the gathered state,
/// detours through the PIN menu when no transaction PIN is held, and
/// finally issues the purchase.
pub struct AirtimeConfirmationHandler {
    sessions: SessionStore,
    api: Arc<dyn BankingApi>,
    rules: AirtimeRules,
}

impl AirtimeConfirmationHandler {
    /// Create the handler.
    #[must_use]
    pub fn new(sessions: SessionStore, api: Arc<dyn BankingApi>, rules: AirtimeRules) -> Self {
        Self {
            sessions,
            api,
            rules,
        }
    }

    async fn grab_string(&self, turn: &Turn, slot: &Slot) -> Result<Option<String>> {
        let value: Option<Value> = self.sessions.grab(&turn.key, slot).await?;
        Ok(value.map(|v| match v {
            Value::String(s) => s,
            other => other.to_string(),
        }))
    }

    async fn daily_total(&self, turn: &Turn) -> Result<f64> {
        let total: Option<f64> = self.sessions.grab(&turn.key, &Slot::AirtimeDailyTotal).await?;
        Ok(total.unwrap_or(0.0))
    }

    async fn clear_flow_slots(&self, turn: &Turn) -> Result<()> {
        self.sessions
            .blank(
                &turn.key,
                &[
                    Slot::AirtimeAmount,
                    Slot::AirtimeMode,
                    Slot::AirtimeRecipient,
                    Slot::AirtimeNetwork,
                    Slot::AirtimeMerchant,
                    Slot::TransactionPin,
                ],
            )
            .await
    }
}

/// Accepts international `254…` or local `07…`/`01…` numbers.
fn acceptable_msisdn(value: &str) -> bool {
    (value.len() == 12 && value.starts_with("254") && value.bytes().all(|b| b.is_ascii_digit()))
        || is_valid_msisdn(value, None)
}

/// Funding account identifier: the numeric prefix of an `id-alias` token.
fn account_id(account: &str) -> &str {
    account.split('-').next().unwrap_or(account)
}

#[async_trait]
impl ActionHandler for AirtimeConfirmationHandler {
    #[allow(clippy::too_many_lines)]
    async fn handle(&self, input: Option<&str>, turn: &mut Turn) -> Result<Option<StepResult>> {
        let Some(input) = input else {
            return Ok(None);
        };

        if input.trim() != "1" {
            self.clear_flow_slots(turn).await?;
            return Ok(Some(StepResult::next("mobilebanking")));
        }

        let merchant = self.grab_string(turn, &Slot::AirtimeMerchant).await?;
        let amount_raw = self.grab_string(turn, &Slot::AirtimeAmount).await?;
        let (Some(merchant), Some(amount_raw)) = (merchant, amount_raw) else {
            self.clear_flow_slots(turn).await?;
            return Ok(Some(StepResult::retry(
                "SLOT_MISSING",
                "Your airtime request has expired. Please start again.",
                "mobilebanking",
            )));
        };

        let mode = self
            .grab_string(turn, &Slot::AirtimeMode)
            .await?
            .unwrap_or_else(|| "own".to_string());

        let recipient = if mode == "other" {
            match self.grab_string(turn, &Slot::AirtimeRecipient).await? {
                Some(recipient) => recipient,
                None => {
                    return Ok(Some(StepResult::retry(
                        "SLOT_MISSING",
                        "Please enter the recipient's mobile number.",
                        "airtime_recipient",
                    )));
                }
            }
        } else {
            turn.key.msisdn().to_string()
        };

        if !acceptable_msisdn(&recipient) {
            return Ok(Some(StepResult::retry(
                "VALIDATION_ERROR",
                "Invalid mobile number. Please try again.",
                "airtime_recipient",
            )));
        }

        let Ok(amount) = amount_raw.trim().parse::<f64>() else {
            return Ok(Some(StepResult::retry(
                "VALIDATION_ERROR",
                "Invalid amount. Please try again.",
                "airtime_amount",
            )));
        };

        if amount < self.rules.min_amount || amount > self.rules.max_amount {
            return Ok(Some(StepResult::retry(
                "VALIDATION_ERROR",
                format!(
                    "Amount must be between {} and {}.",
                    self.rules.min_amount, self.rules.max_amount
                ),
                "airtime_amount",
            )));
        }

        let daily_total = self.daily_total(turn).await?;
        if daily_total + amount > self.rules.daily_limit {
            return Ok(Some(StepResult::retry(
                "LIMIT_EXCEEDED",
                format!("Daily airtime limit of {} exceeded.", self.rules.daily_limit),
                "mobilebanking",
            )));
        }

        let pin = match self.grab_string(turn, &Slot::TransactionPin).await? {
            Some(pin) => pin,
            None => {
                // Detour through the PIN menu, then come back here.
                self.sessions
                    .store(&turn.key, &Slot::PostLoginRedirect, "airtime_confirm")
                    .await?;
                return Ok(Some(StepResult::next("pin")));
            }
        };

        let network = self
            .grab_string(turn, &Slot::AirtimeNetwork)
            .await?
            .unwrap_or_default();
        let funding_account = turn
            .session
            .accounts()
            .first()
            .map(|a| account_id(a).to_string())
            .unwrap_or_default();

        let amount_text = format_amount(amount);
        let envelope = self
            .api
            .airtime_purchase(
                &turn.key,
                &turn.session,
                &merchant,
                &funding_account,
                &recipient,
                &amount_text,
                &pin,
            )
            .await;

        if envelope.success {
            self.sessions
                .store(&turn.key, &Slot::AirtimeDailyTotal, &(daily_total + amount))
                .await?;
            let updated = self.sessions.increment_transaction_count(&turn.key).await?;
            crate::sync_turn_session(turn, updated)?;

            self.clear_flow_slots(turn).await?;

            let reference = envelope
                .field("REFERENCE")
                .or_else(|| envelope.field("TRXID"))
                .unwrap_or("N/A");

            tracing::info!(
                session = %turn.key,
                network = %network,
                amount = amount,
                "Airtime purchase successful"
            );

            Ok(Some(StepResult::end(format!(
                "Airtime purchase of KES {amount_text} to {recipient} successful. Ref: {reference}."
            ))))
        } else {
            let message = envelope
                .error
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "Airtime purchase failed. Please try again.".to_string());

            tracing::warn!(session = %turn.key, status = %envelope.status, "Airtime purchase failed");

            Ok(Some(StepResult::retry(
                "AIRTIME_FAILED",
                message,
                "airtime_retry",
            )))
        }
    }
}

/// Render a whole-shilling amount without a trailing `.0`.
fn format_amount(amount: f64) -> String {
    if (amount.fract()).abs() < f64::EPSILON {
        format!("{}", amount as i64)
    } else {
        format!("{amount:.2}")
    }
}
