//! Mini-statement module.

use async_trait::async_trait;
use std::sync::Arc;
use ussd_gateway_core::{Result, SessionStore, Slot};
use ussd_gateway_engine::{ActionHandler, StepResult, Turn};
use ussd_gateway_upstream::codec::split_fields;
use ussd_gateway_upstream::BankingApi;

/// Transaction rows start at this field offset in the response.
const ROW_OFFSET: usize = 10;

/// Fields per transaction row: date, description, type, amount, balance.
const ROW_WIDTH: usize = 5;

/// Most recent transactions shown.
const MAX_ROWS: usize = 5;

/// Renders the account list and records the statement account.
pub struct StatementAccountHandler {
    sessions: SessionStore,
}

impl StatementAccountHandler {
    /// Create the handler.
    #[must_use]
    pub fn new(sessions: SessionStore) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl ActionHandler for StatementAccountHandler {
    async fn handle(&self, input: Option<&str>, turn: &mut Turn) -> Result<Option<StepResult>> {
        let accounts = turn.session.accounts().to_vec();

        let Some(input) = input else {
            if accounts.is_empty() {
                return Ok(Some(StepResult::end(
                    "No accounts found on your profile. Please contact customer care.",
                )));
            }

            let mut message = String::from("Select account for mini statement:");
            for (index, account) in accounts.iter().enumerate() {
                message.push('\n');
                message.push_str(&(index + 1).to_string());
                message.push_str(". ");
                message.push_str(account);
            }
            return Ok(Some(StepResult::message(message)));
        };

        match input.trim().parse::<usize>().ok() {
            Some(index) if (1..=accounts.len()).contains(&index) => {
                self.sessions
                    .store(&turn.key, &Slot::StatementAccount, &accounts[index - 1])
                    .await?;
                Ok(Some(StepResult::next("statement_result")))
            }
            _ => Ok(Some(StepResult::retry(
                "VALIDATION_ERROR",
                "Invalid selection. Please try again.",
                "statement_accounts",
            ))),
        }
    }
}

/// Fetches and formats the mini statement; always ends the session.
pub struct StatementRequestHandler {
    sessions: SessionStore,
    api: Arc<dyn BankingApi>,
}

impl StatementRequestHandler {
    /// Create the handler.
    #[must_use]
    pub fn new(sessions: SessionStore, api: Arc<dyn BankingApi>) -> Self {
        Self { sessions, api }
    }
}

#[async_trait]
impl ActionHandler for StatementRequestHandler {
    async fn handle(&self, _input: Option<&str>, turn: &mut Turn) -> Result<Option<StepResult>> {
        let account: Option<String> = self
            .sessions
            .grab(&turn.key, &Slot::StatementAccount)
            .await?;
        let Some(account) = account else {
            return Ok(Some(StepResult::retry(
                "SLOT_MISSING",
                "Please select an account first.",
                "statement_accounts",
            )));
        };

        let envelope = self
            .api
            .mini_statement(&turn.key, &turn.session, &account)
            .await;

        self.sessions
            .blank(&turn.key, &[Slot::StatementAccount])
            .await?;

        if !envelope.success {
            tracing::warn!(session = %turn.key, status = %envelope.status, "Mini statement failed");
            return Ok(Some(StepResult::end(
                "Unable to fetch your mini statement at this time. Please try again later.",
            )));
        }

        let transactions = parse_transactions(&envelope.raw);
        if transactions.is_empty() {
            return Ok(Some(StepResult::end(format!(
                "Mini Statement ({account})\nNo recent transactions."
            ))));
        }

        let mut message = format!("Mini Statement ({account})");
        for row in &transactions {
            message.push('\n');
            message.push_str(&row.to_line());
        }

        Ok(Some(StepResult::end(message)))
    }
}

/// One parsed statement row.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StatementRow {
    date: String,
    description: String,
    trx_type: String,
    amount: String,
    balance: String,
}

impl StatementRow {
    fn to_line(&self) -> String {
        format!(
            "{} {} {} {} Bal {}",
            self.date, self.description, self.trx_type, self.amount, self.balance
        )
    }
}

/// Parse the positional response body into up to five transactions.
///
/// Rows live at a fixed offset because the header fields repeat the same
/// keys as the rows.
fn parse_transactions(raw: &str) -> Vec<StatementRow> {
    let fields = split_fields(raw);
    let mut rows = Vec::new();

    let mut i = ROW_OFFSET;
    while i + ROW_WIDTH <= fields.len() && rows.len() < MAX_ROWS {
        let row = StatementRow {
            date: fields[i].clone(),
            description: fields[i + 1].clone(),
            trx_type: fields[i + 2].clone(),
            amount: fields[i + 3].clone(),
            balance: fields[i + 4].clone(),
        };

        if !row.date.is_empty() {
            rows.push(row);
        }
        i += ROW_WIDTH;
    }

    rows
}
