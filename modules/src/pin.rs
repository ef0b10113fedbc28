//! PIN module: login PIN processing and transaction-PIN capture.

use crate::sync_turn_session;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use ussd_gateway_core::{CustomerData, Result, SessionStore, Slot};
use ussd_gateway_engine::{ActionHandler, FrameAction, StepResult, Turn};
use ussd_gateway_engine::is_valid_pin;
use ussd_gateway_upstream::BankingApi;

/// Handles the home-menu PIN prompt: a PIN attempt or the literal `"1"`
/// for the forgot-PIN branch.
pub struct PinHandler {
    sessions: SessionStore,
    api: Arc<dyn BankingApi>,
}

impl PinHandler {
    /// Create the handler.
    #[must_use]
    pub fn new(sessions: SessionStore, api: Arc<dyn BankingApi>) -> Self {
        Self { sessions, api }
    }
}

#[async_trait]
impl ActionHandler for PinHandler {
    async fn handle(&self, input: Option<&str>, turn: &mut Turn) -> Result<Option<StepResult>> {
        // Render: the home message comes from configuration.
        let Some(input) = input else {
            return Ok(None);
        };
        let input = input.trim();

        if input == "1" {
            return Ok(Some(StepResult::next("forgot_pin_info")));
        }

        if !is_valid_pin(input) {
            return Ok(Some(StepResult::retry(
                "VALIDATION_ERROR",
                "PIN must be 4 to 6 digits.",
                "home",
            )));
        }

        self.sessions
            .store(&turn.key, &Slot::PinAttempt, input)
            .await?;

        let envelope = self.api.login(&turn.key, &turn.session, input).await;

        if envelope.success {
            let accounts: Vec<String> = envelope
                .field("ACCOUNTS")
                .unwrap_or("")
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .collect();

            let customer_patch = match &turn.session.customer_data {
                Some(_) => json!({ "accounts": accounts }),
                None => {
                    let mut guest = CustomerData::guest();
                    guest.accounts = accounts;
                    serde_json::to_value(guest)?
                }
            };

            let updated = self
                .sessions
                .update(
                    &turn.key,
                    &json!({
                        "authStatus": "authenticated",
                        "customerData": customer_patch,
                    }),
                )
                .await?;

            self.sessions
                .store(&turn.key, &Slot::LoginData, &envelope.data)
                .await?;

            sync_turn_session(turn, updated)?;

            tracing::info!(session = %turn.key, "Login successful");
            return Ok(Some(StepResult::next("main_menu")));
        }

        match envelope.status.as_str() {
            "101" => Ok(Some(StepResult {
                action: Some(FrameAction::Con),
                message: Some(
                    "Your PIN has expired. Please set a new PIN to continue.".to_string(),
                ),
                next_menu: Some("change_pin_forced".to_string()),
                ..StepResult::default()
            })),
            "102" => Ok(Some(StepResult::end(
                "Your account has been blocked. Please contact customer care or visit your nearest branch.",
            ))),
            "091" => Ok(Some(StepResult::retry(
                "LOGIN_FAILED",
                "Invalid Login Password",
                "home",
            ))),
            _ => {
                let message = envelope
                    .error
                    .clone()
                    .filter(|m| !m.is_empty())
                    .or_else(|| envelope.message.clone())
                    .unwrap_or_else(|| "Login failed. Please try again.".to_string());

                Ok(Some(StepResult::retry("LOGIN_FAILED", message, "home")))
            }
        }
    }
}

/// Captures a transaction PIN and returns to the workflow that needed it.
pub struct TransactionPinHandler {
    sessions: SessionStore,
}

impl TransactionPinHandler {
    /// Create the handler.
    #[must_use]
    pub fn new(sessions: SessionStore) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl ActionHandler for TransactionPinHandler {
    async fn handle(&self, input: Option<&str>, turn: &mut Turn) -> Result<Option<StepResult>> {
        let Some(input) = input else {
            return Ok(None);
        };
        let input = input.trim();

        if !is_valid_pin(input) {
            return Ok(Some(StepResult::retry(
                "VALIDATION_ERROR",
                "PIN must be 4 to 6 digits.",
                "pin",
            )));
        }

        self.sessions
            .store(&turn.key, &Slot::TransactionPin, input)
            .await?;

        // Consume the redirect hint left by the interrupted workflow.
        let redirect: Option<String> = self
            .sessions
            .grab(&turn.key, &Slot::PostLoginRedirect)
            .await?;
        self.sessions
            .blank(&turn.key, &[Slot::PostLoginRedirect])
            .await?;

        Ok(Some(StepResult::next(
            redirect.unwrap_or_else(|| "main_menu".to_string()),
        )))
    }
}
