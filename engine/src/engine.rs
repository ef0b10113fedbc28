//! Menu rendering and input processing.

use crate::condition::evaluate;
use crate::context::substitute;
use crate::loader::MenuStore;
use crate::menu::{Frame, MenuAction, MenuNode, MenuOption, StepResult};
use crate::registry::{HandlerRegistry, Turn};
use crate::validation::{apply_transform, validate, ValidationRule};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use ussd_gateway_core::{Session, SessionKey, SessionStore, Slot};

/// Message used when an internal step cannot complete.
const UNAVAILABLE: &str = "Service temporarily unavailable. Please try again.";

/// Upstream seam for declarative `api_call` actions.
///
/// Returns the envelope as a JSON value; transport failures are expressed
/// in-band (`success: false`), never as an error.
#[async_trait]
pub trait ApiPort: Send + Sync {
    /// Issue one backend call on behalf of a menu action.
    async fn call(&self, service: &str, data: &str, key: &SessionKey, session: &Session) -> Value;
}

/// The configuration-driven menu engine.
pub struct MenuEngine {
    menus: MenuStore,
    registry: HandlerRegistry,
    sessions: SessionStore,
    api: Option<Arc<dyn ApiPort>>,
}

impl MenuEngine {
    /// Create an engine over a menu store, handler registry and session
    /// store.
    #[must_use]
    pub fn new(menus: MenuStore, registry: HandlerRegistry, sessions: SessionStore) -> Self {
        Self {
            menus,
            registry,
            sessions,
            api: None,
        }
    }

    /// Attach the upstream port used by `api_call` actions.
    #[must_use]
    pub fn with_api(mut self, api: Arc<dyn ApiPort>) -> Self {
        self.api = Some(api);
        self
    }

    /// The menu store, for hot reload.
    #[must_use]
    pub fn menus(&self) -> &MenuStore {
        &self.menus
    }

    /// Render a menu node into a frame.
    ///
    /// The synthetic `end` node always renders a terminal farewell. A
    /// missing node degrades to a friendly `con` frame rather than
    /// failing the turn. A node handler runs once per turn with null
    /// input; when it yields a message, that frame is returned directly.
    pub async fn render(&self, menu_name: &str, turn: &mut Turn) -> Frame {
        if menu_name == "end" {
            return Frame::end("Thank you for using our service. Goodbye.");
        }

        let menus = self.menus.snapshot();
        let Some(node) = menus.get(menu_name) else {
            tracing::warn!(menu = menu_name, "Menu not available");
            return Frame::con("Menu not available.").with_next_menu(Some(menu_name.to_string()));
        };

        if let Some(handler) = &node.handler {
            if !turn.was_rendered(menu_name) {
                turn.mark_rendered(menu_name);

                if let Some(result) = self.registry.invoke(handler, None, turn).await {
                    if let Some(message) = result.message {
                        return Frame {
                            action: result.action.unwrap_or(node.action),
                            message,
                            next_menu: result.next_menu,
                        };
                    }
                }
            }
        }

        let mut message = substitute(&node.message, &turn.context);

        for (index, option) in node.options.iter().enumerate() {
            if let Some(condition) = &option.condition {
                if !evaluate(condition, &turn.context) {
                    continue;
                }
            }
            message.push('\n');
            message.push_str(&(index + 1).to_string());
            message.push_str(". ");
            message.push_str(&substitute(&option.text, &turn.context));
        }

        if let Some(hint) = navigation_hint(node) {
            message.push_str("\n\n");
            message.push_str(&hint);
        }

        Frame {
            action: node.action,
            message: message.trim_end().to_string(),
            next_menu: None,
        }
    }

    /// Process an input against a menu node.
    ///
    /// Resolution order: navigation map, direct handler, numeric options,
    /// `inputConfig`, then the default invalid-input re-prompt.
    pub async fn process(&self, menu_name: &str, input: &str, turn: &mut Turn) -> StepResult {
        let menus = self.menus.snapshot();
        let Some(node) = menus.get(menu_name) else {
            tracing::warn!(menu = menu_name, "Processing input for unknown menu");
            return StepResult::invalid(menu_name);
        };

        if let Some(target) = navigation_target(node, input) {
            return StepResult::next(target);
        }

        if let Some(handler) = &node.handler {
            if let Some(result) = self.registry.invoke(handler, Some(input), turn).await {
                return result;
            }
        }

        if !node.options.is_empty() {
            if let Ok(index) = input.trim().parse::<usize>() {
                if (1..=node.options.len()).contains(&index) {
                    return self.select_option(node, index - 1, turn).await;
                }
            }
        }

        if let Some(input_config) = node.input_config.clone() {
            return self
                .process_input_config(node, &input_config, input, turn)
                .await;
        }

        StepResult::invalid(menu_name)
    }

    async fn select_option(&self, node: &MenuNode, index: usize, turn: &mut Turn) -> StepResult {
        let option: &MenuOption = &node.options[index];

        if let Some(condition) = &option.condition {
            if !evaluate(condition, &turn.context) {
                return StepResult::retry(
                    "OPTION_UNAVAILABLE",
                    "Option not available. Please try again.",
                    &node.name,
                );
            }
        }

        if let Some(store) = &option.store {
            if self.execute_store(store, turn).await.is_err() {
                return StepResult::retry("STORE_ERROR", UNAVAILABLE, &node.name);
            }
        }

        if let Some(action) = &option.action {
            return self.run_api_call(action, &node.name, turn).await;
        }

        if let Some(handler) = &option.handler {
            if let Some(result) = self.registry.invoke(handler, None, turn).await {
                return result;
            }
        }

        if let Some(next_menu) = &option.next_menu {
            return StepResult::next(next_menu);
        }

        StepResult::invalid(&node.name)
    }

    /// Execute option `store` directives.
    ///
    /// Each value resolves as a dotted path against the context; a path
    /// that does not resolve stores the literal string instead.
    async fn execute_store(
        &self,
        store: &BTreeMap<String, String>,
        turn: &mut Turn,
    ) -> ussd_gateway_core::Result<()> {
        for (slot_name, path_or_literal) in store {
            let value = crate::context::resolve_path(&turn.context, path_or_literal)
                .cloned()
                .unwrap_or_else(|| Value::String(path_or_literal.clone()));

            match Slot::parse(slot_name) {
                Some(slot) => self.sessions.store(&turn.key, &slot, &value).await?,
                None => {
                    tracing::warn!(slot = slot_name.as_str(), "Unknown slot name in store directive");
                }
            }
        }
        Ok(())
    }

    async fn run_api_call(
        &self,
        action: &MenuAction,
        menu_name: &str,
        turn: &mut Turn,
    ) -> StepResult {
        let MenuAction::ApiCall {
            service,
            data,
            store_as,
            next_menu_on_success,
            next_menu_on_error,
        } = action;

        let retry_menu = next_menu_on_error.as_deref().unwrap_or(menu_name);

        let Some(api) = &self.api else {
            tracing::error!(menu = menu_name, "api_call action without an upstream port");
            return StepResult::retry("API_ERROR", UNAVAILABLE, retry_menu);
        };

        let data = substitute(data, &turn.context);
        let envelope = api.call(service, &data, &turn.key, &turn.session).await;

        if envelope.get("success").and_then(Value::as_bool) == Some(true) {
            if let Some(store_as) = store_as {
                let payload = envelope.get("data").cloned().unwrap_or(Value::Null);
                match Slot::parse(store_as) {
                    Some(slot) => {
                        if let Err(e) = self.sessions.store(&turn.key, &slot, &payload).await {
                            tracing::warn!(slot = store_as.as_str(), error = %e, "Failed to store api_call result");
                        }
                    }
                    None => {
                        tracing::warn!(slot = store_as.as_str(), "Unknown slot name in storeAs");
                    }
                }
            }

            match next_menu_on_success {
                Some(menu) => StepResult::next(menu),
                None => {
                    let message = envelope
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("Request completed.");
                    StepResult::message(message)
                }
            }
        } else {
            let message = envelope
                .get("error")
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .unwrap_or(UNAVAILABLE);
            StepResult::retry("API_ERROR", message, retry_menu)
        }
    }

    async fn process_input_config(
        &self,
        node: &MenuNode,
        input_config: &crate::menu::InputConfig,
        input: &str,
        turn: &mut Turn,
    ) -> StepResult {
        if let Some(rule) = &input_config.validation {
            if let ValidationRule::Custom { handler } = rule {
                if let Some(result) = self.registry.invoke(handler, Some(input), turn).await {
                    if result.is_error() {
                        return StepResult {
                            retry_menu: result.retry_menu.clone().or_else(|| Some(node.name.clone())),
                            ..result
                        };
                    }
                }
            } else if let Err(message) = validate(rule, input) {
                return StepResult::retry("VALIDATION_ERROR", message, &node.name);
            }
        }

        let value = input_config
            .transform
            .map_or_else(|| input.to_string(), |t| apply_transform(t, input));

        if let Some(store_key) = &input_config.store_key {
            match Slot::parse(store_key) {
                Some(slot) => {
                    if let Err(e) = self.sessions.store(&turn.key, &slot, &value).await {
                        tracing::warn!(slot = store_key.as_str(), error = %e, "Failed to store input");
                        return StepResult::retry("STORE_ERROR", UNAVAILABLE, &node.name);
                    }
                }
                None => {
                    tracing::warn!(slot = store_key.as_str(), "Unknown slot name in storeKey");
                }
            }
        }

        if let Some(handler) = &input_config.handler {
            if let Some(result) = self.registry.invoke(handler, Some(&value), turn).await {
                return result;
            }
        }

        if let Some(next_menu) = &input_config.next_menu {
            return StepResult::next(next_menu);
        }

        StepResult::invalid(&node.name)
    }
}

/// Resolve navigation for an input: exact routes first, then the reserved
/// back/home/exit keys, then the legacy node-level fields.
fn navigation_target(node: &MenuNode, input: &str) -> Option<String> {
    if let Some(nav) = &node.navigation {
        if let Some(target) = nav.routes.get(input) {
            return Some(target.clone());
        }

        let reserved = match input {
            "0" => nav.on_back.as_ref(),
            "00" => nav.on_home.as_ref(),
            "000" => nav.on_exit.as_ref(),
            _ => None,
        };
        if let Some(target) = reserved {
            return Some(target.clone());
        }
    }

    match input {
        "0" => node.on_back.clone(),
        "00" => node.on_home.clone(),
        "000" => node.on_exit.clone(),
        _ => None,
    }
}

/// Footer hint for the reserved navigation inputs a node supports.
fn navigation_hint(node: &MenuNode) -> Option<String> {
    let (back, home, exit) = match &node.navigation {
        Some(nav) => (
            nav.on_back.is_some() || node.on_back.is_some(),
            nav.on_home.is_some() || node.on_home.is_some(),
            nav.on_exit.is_some() || node.on_exit.is_some(),
        ),
        None => (
            node.on_back.is_some(),
            node.on_home.is_some(),
            node.on_exit.is_some(),
        ),
    };

    let mut parts = Vec::new();
    if back {
        parts.push("0. Back");
    }
    if home {
        parts.push("00. Home");
    }
    if exit {
        parts.push("000. Exit");
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("  "))
    }
}
