//! Action modules for the USSD gateway.
//!
//! Each module is a small state machine over the session slots, invoked by
//! the menu engine through the handler registry. Handlers are registered
//! under `"{module}.{method}"` names at bootstrap, with the short aliases
//! menu files refer to.

pub mod airtime;
pub mod balance;
pub mod pin;
pub mod rules;
pub mod statement;

pub use airtime::AirtimeConfirmationHandler;
pub use balance::{BalancePinHandler, BalanceRequestHandler};
pub use pin::{PinHandler, TransactionPinHandler};
pub use rules::{AirtimeRules, BusinessRules};
pub use statement::{StatementAccountHandler, StatementRequestHandler};

use serde_json::Value;
use std::sync::Arc;
use ussd_gateway_core::{Result, Session, SessionStore};
use ussd_gateway_engine::{HandlerRegistry, Turn};
use ussd_gateway_upstream::BankingApi;

/// Propagate an updated session record into the in-flight turn.
///
/// Keeps `turn.session` and the rendering context consistent with what a
/// handler just persisted, so menus rendered later in the same turn see
/// the new state.
///
/// # Errors
///
/// Returns a serialization error if the session cannot be re-encoded.
pub fn sync_turn_session(turn: &mut Turn, session: Session) -> Result<()> {
    turn.context["session"] = serde_json::to_value(&session)?;
    turn.context["customer"] = match &session.customer_data {
        Some(customer) => serde_json::to_value(customer)?,
        None => Value::Null,
    };
    turn.session = session;
    Ok(())
}

/// Register every module handler and its alias.
pub fn register_all(
    registry: &mut HandlerRegistry,
    sessions: &SessionStore,
    api: &Arc<dyn BankingApi>,
    rules: &BusinessRules,
) {
    registry.register(
        "pin.processPinOrForgot",
        Arc::new(PinHandler::new(sessions.clone(), Arc::clone(api))),
    );
    registry.register(
        "pin.captureTransactionPin",
        Arc::new(TransactionPinHandler::new(sessions.clone())),
    );
    registry.register(
        "balance.processBalanceRequest",
        Arc::new(BalanceRequestHandler::new(sessions.clone())),
    );
    registry.register(
        "balance.processBalancePin",
        Arc::new(BalancePinHandler::new(sessions.clone(), Arc::clone(api))),
    );
    registry.register(
        "statement.processAccountSelection",
        Arc::new(StatementAccountHandler::new(sessions.clone())),
    );
    registry.register(
        "statement.processStatementRequest",
        Arc::new(StatementRequestHandler::new(sessions.clone(), Arc::clone(api))),
    );
    registry.register(
        "airtime.processAirtimeConfirmation",
        Arc::new(AirtimeConfirmationHandler::new(
            sessions.clone(),
            Arc::clone(api),
            rules.airtime,
        )),
    );

    registry.alias("process_pin", "pin.processPinOrForgot");
    registry.alias("capture_transaction_pin", "pin.captureTransactionPin");
    registry.alias("process_balance", "balance.processBalanceRequest");
    registry.alias("process_balance_pin", "balance.processBalancePin");
    registry.alias("select_statement_account", "statement.processAccountSelection");
    registry.alias("process_statement", "statement.processStatementRequest");
    registry.alias("process_airtime", "airtime.processAirtimeConfirmation");
}
