//! Balance module: account selection followed by PIN-verified inquiry.

use async_trait::async_trait;
use std::sync::Arc;
use ussd_gateway_core::{Result, SessionStore, Slot};
use ussd_gateway_engine::{is_valid_pin, ActionHandler, FrameAction, StepResult, Turn};
use ussd_gateway_upstream::BankingApi;

/// Renders the account list and records the caller's selection.
pub struct BalanceRequestHandler {
    sessions: SessionStore,
}

impl BalanceRequestHandler {
    /// Create the handler.
    #[must_use]
    pub fn new(sessions: SessionStore) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl ActionHandler for BalanceRequestHandler {
    async fn handle(&self, input: Option<&str>, turn: &mut Turn) -> Result<Option<StepResult>> {
        let accounts = turn.session.accounts().to_vec();

        let Some(input) = input else {
            if accounts.is_empty() {
                return Ok(Some(StepResult::end(
                    "No accounts found on your profile. Please contact customer care.",
                )));
            }

            let mut message = String::from("Select account:");
            for (index, account) in accounts.iter().enumerate() {
                message.push('\n');
                message.push_str(&(index + 1).to_string());
                message.push_str(". ");
                message.push_str(account);
            }
            return Ok(Some(StepResult::message(message)));
        };

        let selection = input.trim().parse::<usize>().ok();
        match selection {
            Some(index) if (1..=accounts.len()).contains(&index) => {
                self.sessions
                    .store(
                        &turn.key,
                        &Slot::BalanceSelectedAccount,
                        &accounts[index - 1],
                    )
                    .await?;
                Ok(Some(StepResult::next("balance_pin")))
            }
            _ => Ok(Some(StepResult::retry(
                "VALIDATION_ERROR",
                "Invalid selection. Please try again.",
                "balance_accounts",
            ))),
        }
    }
}

/// Verifies the PIN and issues the balance query.
pub struct BalancePinHandler {
    sessions: SessionStore,
    api: Arc<dyn BankingApi>,
}

impl BalancePinHandler {
    /// Create the handler.
    #[must_use]
    pub fn new(sessions: SessionStore, api: Arc<dyn BankingApi>) -> Self {
        Self { sessions, api }
    }

    async fn clear_flow_slots(&self, turn: &Turn) -> Result<()> {
        self.sessions
            .blank(
                &turn.key,
                &[Slot::BalanceSelectedAccount, Slot::TransactionPin],
            )
            .await
    }
}

#[async_trait]
impl ActionHandler for BalancePinHandler {
    async fn handle(&self, input: Option<&str>, turn: &mut Turn) -> Result<Option<StepResult>> {
        let Some(input) = input else {
            return Ok(None);
        };
        let input = input.trim();

        if !is_valid_pin(input) {
            return Ok(Some(StepResult::retry(
                "VALIDATION_ERROR",
                "PIN must be 4 to 6 digits.",
                "balance_pin",
            )));
        }

        let account: Option<String> = self
            .sessions
            .grab(&turn.key, &Slot::BalanceSelectedAccount)
            .await?;
        let Some(account) = account else {
            return Ok(Some(StepResult::retry(
                "SLOT_MISSING",
                "Please select an account first.",
                "balance_accounts",
            )));
        };

        self.sessions
            .store(&turn.key, &Slot::TransactionPin, input)
            .await?;

        let login = self.api.login(&turn.key, &turn.session, input).await;
        if !login.success {
            let message = login
                .error
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "Invalid PIN".to_string());
            return Ok(Some(StepResult::retry(
                "LOGIN_FAILED",
                message,
                "balance_pin",
            )));
        }

        let envelope = self.api.balance(&turn.key, &turn.session, &account).await;

        if envelope.success {
            let raw_message = envelope
                .field("MESSAGE")
                .map(str::to_string)
                .unwrap_or_else(|| envelope.message_or_empty().to_string());
            let summary = format_balance_summary(&raw_message);

            self.clear_flow_slots(turn).await?;

            Ok(Some(StepResult {
                action: Some(FrameAction::Con),
                message: Some(summary),
                next_menu: Some("main_menu".to_string()),
                ..StepResult::default()
            }))
        } else {
            self.clear_flow_slots(turn).await?;
            tracing::warn!(session = %turn.key, status = %envelope.status, "Balance inquiry failed");

            Ok(Some(StepResult::retry(
                "BALANCE_FAILED",
                "Unable to fetch your balance at this time. Please try again later.",
                "main_menu",
            )))
        }
    }
}

/// Turn a pipe-separated `label|value|…` payload into display lines.
fn format_balance_summary(raw: &str) -> String {
    let fields: Vec<&str> = raw.split('|').map(str::trim).collect();
    let mut lines = Vec::new();

    let mut i = 0;
    while i + 1 < fields.len() {
        if !fields[i].is_empty() {
            lines.push(format!("{}: {}", fields[i], fields[i + 1]));
        }
        i += 2;
    }

    if lines.is_empty() {
        raw.trim().to_string()
    } else {
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use ussd_gateway_core::{MemoryKvStore, SessionConfig, SessionKey};
    use ussd_gateway_upstream::{decode_envelope, MockBankingApi};

    fn sessions() -> SessionStore {
        SessionStore::new(Arc::new(MemoryKvStore::new()), SessionConfig::default())
    }

    async fn authenticated_turn(sessions: &SessionStore) -> (SessionKey, Turn) {
        let key = sessions.key("254700111222", "S1", Some("527"));
        sessions.create(&key).await.unwrap();
        let session = sessions
            .update(
                &key,
                &json!({
                    "authStatus": "authenticated",
                    "customerData": {
                        "customerId": "C100",
                        "firstName": "Amina",
                        "lastName": "Odhiambo",
                        "language": "en",
                        "accounts": ["0102030405-Main", "0102030406-Savings"]
                    }
                }),
            )
            .await
            .unwrap();

        let context = json!({
            "customer": serde_json::to_value(&session.customer_data).unwrap(),
            "session": serde_json::to_value(&session).unwrap(),
            "data": {},
            "transaction": {}
        });
        (key.clone(), Turn::new(key, session, context))
    }

    #[tokio::test]
    async fn test_render_lists_accounts_one_indexed() {
        let sessions = sessions();
        let (_, mut turn) = authenticated_turn(&sessions).await;

        let handler = BalanceRequestHandler::new(sessions);
        let result = handler.handle(None, &mut turn).await.unwrap().unwrap();

        let message = result.message.unwrap();
        assert!(message.contains("1. 0102030405-Main"));
        assert!(message.contains("2. 0102030406-Savings"));
    }

    #[tokio::test]
    async fn test_selection_stores_account() {
        let sessions = sessions();
        let (key, mut turn) = authenticated_turn(&sessions).await;

        let handler = BalanceRequestHandler::new(sessions.clone());
        let result = handler.handle(Some("1"), &mut turn).await.unwrap().unwrap();

        assert_eq!(result.next_menu.as_deref(), Some("balance_pin"));
        let stored: Option<String> = sessions
            .grab(&key, &Slot::BalanceSelectedAccount)
            .await
            .unwrap();
        assert_eq!(stored.as_deref(), Some("0102030405-Main"));
    }

    #[tokio::test]
    async fn test_out_of_range_selection_reprompts() {
        let sessions = sessions();
        let (_, mut turn) = authenticated_turn(&sessions).await;

        let handler = BalanceRequestHandler::new(sessions);
        let result = handler.handle(Some("3"), &mut turn).await.unwrap().unwrap();
        assert_eq!(result.retry_menu.as_deref(), Some("balance_accounts"));
    }

    #[tokio::test]
    async fn test_balance_happy_path() {
        let sessions = sessions();
        let (key, mut turn) = authenticated_turn(&sessions).await;
        sessions
            .store(&key, &Slot::BalanceSelectedAccount, "0102030405-Main")
            .await
            .unwrap();

        let api = Arc::new(MockBankingApi::new());
        api.enqueue("LOGIN", decode_envelope("STATUS:000:"));
        api.enqueue(
            "B-",
            decode_envelope(
                "STATUS:000:MESSAGE:BALANCE|KES 1,234.00|AVAILABLE|KES 1,200.00",
            ),
        );

        let handler = BalancePinHandler::new(sessions.clone(), api.clone());
        let result = handler
            .handle(Some("1234"), &mut turn)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.action, Some(FrameAction::Con));
        assert_eq!(result.next_menu.as_deref(), Some("main_menu"));

        let message = result.message.unwrap();
        assert!(message.contains("BALANCE: KES 1,234.00"));
        assert!(message.contains("AVAILABLE: KES 1,200.00"));

        assert_eq!(api.call_count("LOGIN"), 1);
        assert_eq!(api.call_count("B-"), 1);

        // Flow slots are consumed.
        assert!(!sessions
            .possess(&key, &Slot::BalanceSelectedAccount)
            .await
            .unwrap());
        assert!(!sessions.possess(&key, &Slot::TransactionPin).await.unwrap());
    }

    #[tokio::test]
    async fn test_bad_pin_shape_reprompts_pin_menu() {
        let sessions = sessions();
        let (_, mut turn) = authenticated_turn(&sessions).await;

        let api = Arc::new(MockBankingApi::new());
        let handler = BalancePinHandler::new(sessions, api.clone());

        let result = handler.handle(Some("1"), &mut turn).await.unwrap().unwrap();
        assert_eq!(result.retry_menu.as_deref(), Some("balance_pin"));
        assert_eq!(api.call_count("LOGIN"), 0);
    }

    #[tokio::test]
    async fn test_login_failure_keeps_flow() {
        let sessions = sessions();
        let (key, mut turn) = authenticated_turn(&sessions).await;
        sessions
            .store(&key, &Slot::BalanceSelectedAccount, "0102030405-Main")
            .await
            .unwrap();

        let api = Arc::new(MockBankingApi::new());
        api.enqueue("LOGIN", decode_envelope("STATUS:091:"));

        let handler = BalancePinHandler::new(sessions.clone(), api);
        let result = handler
            .handle(Some("9999"), &mut turn)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.error_message.as_deref(), Some("Invalid PIN"));
        assert_eq!(result.retry_menu.as_deref(), Some("balance_pin"));
        // Selection survives so the caller can retry the PIN.
        assert!(sessions
            .possess(&key, &Slot::BalanceSelectedAccount)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_balance_failure_clears_slots() {
        let sessions = sessions();
        let (key, mut turn) = authenticated_turn(&sessions).await;
        sessions
            .store(&key, &Slot::BalanceSelectedAccount, "0102030405-Main")
            .await
            .unwrap();

        let api = Arc::new(MockBankingApi::new());
        api.enqueue("LOGIN", decode_envelope("STATUS:000:"));
        api.enqueue("B-", decode_envelope("STATUS:093:"));

        let handler = BalancePinHandler::new(sessions.clone(), api);
        let result = handler
            .handle(Some("1234"), &mut turn)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.error.as_deref(), Some("BALANCE_FAILED"));
        assert!(!sessions
            .possess(&key, &Slot::BalanceSelectedAccount)
            .await
            .unwrap());
    }

    #[test]
    fn test_format_balance_summary() {
        assert_eq!(
            format_balance_summary("BALANCE|KES 1,234.00|AVAILABLE|KES 1,200.00"),
            "BALANCE: KES 1,234.00\nAVAILABLE: KES 1,200.00"
        );
        assert_eq!(format_balance_summary("plain text"), "plain text");
    }
}
