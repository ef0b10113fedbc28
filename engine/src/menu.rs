//! Menu configuration model and frame types.
//!
//! One `MenuNode` per JSON file; nodes are immutable after load. The JSON
//! field names are the stable configuration surface, hence camelCase
//! renames throughout.

use crate::condition::Condition;
use crate::validation::{Transform, ValidationRule};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Terminal action of a frame: continue the session or end it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameAction {
    /// Display a menu and await the next turn.
    Con,
    /// Terminal message; the session is over.
    End,
}

impl FrameAction {
    /// Wire form of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Con => "con",
            Self::End => "end",
        }
    }
}

/// The result of a turn: an action plus the text shown to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Continue or end.
    pub action: FrameAction,

    /// Human-readable body.
    pub message: String,

    /// Menu the session should move to, when the frame implies one.
    pub next_menu: Option<String>,
}

impl Frame {
    /// A continue frame.
    #[must_use]
    pub fn con(message: impl Into<String>) -> Self {
        Self {
            action: FrameAction::Con,
            message: message.into(),
            next_menu: None,
        }
    }

    /// A terminal frame.
    #[must_use]
    pub fn end(message: impl Into<String>) -> Self {
        Self {
            action: FrameAction::End,
            message: message.into(),
            next_menu: None,
        }
    }

    /// Attach the menu this frame transitions to.
    #[must_use]
    pub fn with_next_menu(mut self, next_menu: Option<String>) -> Self {
        self.next_menu = next_menu;
        self
    }

    /// Wire rendering: `"{action} {message}"`.
    #[must_use]
    pub fn to_wire(&self) -> String {
        format!("{} {}", self.action.as_str(), self.message)
    }
}

/// Normalised outcome of processing one input against a node.
///
/// Either a routing/message outcome (`action`/`message`/`next_menu`) or an
/// error outcome (`error`/`error_message`/`retry_menu`); handlers may fill
/// any combination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepResult {
    /// Frame action; `None` defaults to `con`.
    pub action: Option<FrameAction>,

    /// Message to display directly, when the step produced one.
    pub message: Option<String>,

    /// Menu to route to.
    pub next_menu: Option<String>,

    /// Machine-readable error tag.
    pub error: Option<String>,

    /// User-facing error text.
    pub error_message: Option<String>,

    /// Menu to re-prompt with after an error.
    pub retry_menu: Option<String>,
}

impl StepResult {
    /// Route to a menu with no message of its own.
    #[must_use]
    pub fn next(menu: impl Into<String>) -> Self {
        Self {
            next_menu: Some(menu.into()),
            ..Self::default()
        }
    }

    /// A continue frame with a message.
    #[must_use]
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            action: Some(FrameAction::Con),
            message: Some(text.into()),
            ..Self::default()
        }
    }

    /// A terminal frame with a message.
    #[must_use]
    pub fn end(text: impl Into<String>) -> Self {
        Self {
            action: Some(FrameAction::End),
            message: Some(text.into()),
            ..Self::default()
        }
    }

    /// An error that re-prompts the given menu.
    #[must_use]
    pub fn retry(
        error: impl Into<String>,
        error_message: impl Into<String>,
        retry_menu: impl Into<String>,
    ) -> Self {
        Self {
            error: Some(error.into()),
            error_message: Some(error_message.into()),
            retry_menu: Some(retry_menu.into()),
            ..Self::default()
        }
    }

    /// The default invalid-input outcome for a node.
    #[must_use]
    pub fn invalid(menu: impl Into<String>) -> Self {
        Self::retry(
            "INVALID_INPUT",
            "Invalid selection. Please try again.",
            menu,
        )
    }

    /// Attach the menu this result transitions to.
    #[must_use]
    pub fn with_next_menu(mut self, menu: impl Into<String>) -> Self {
        self.next_menu = Some(menu.into());
        self
    }

    /// `true` if this result carries an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// One vertex of the configuration-driven menu state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuNode {
    /// Node name; filled from the file stem on load.
    #[serde(default)]
    pub name: String,

    /// Message template with `{dotted.path}` placeholders.
    pub message: String,

    /// Numbered options.
    #[serde(default)]
    pub options: Vec<MenuOption>,

    /// Free-form input handling.
    #[serde(default)]
    pub input_config: Option<InputConfig>,

    /// Handler invoked before options (null input on render, the value on
    /// process).
    #[serde(default)]
    pub handler: Option<String>,

    /// Literal-input routing plus the reserved back/home/exit keys.
    #[serde(default)]
    pub navigation: Option<Navigation>,

    /// Default frame action when rendering this node.
    #[serde(default = "default_action")]
    pub action: FrameAction,

    /// Legacy node-level back target.
    #[serde(default)]
    pub on_back: Option<String>,

    /// Legacy node-level home target.
    #[serde(default)]
    pub on_home: Option<String>,

    /// Legacy node-level exit target.
    #[serde(default)]
    pub on_exit: Option<String>,
}

const fn default_action() -> FrameAction {
    FrameAction::Con
}

impl MenuNode {
    /// A bare node with only a message, for tests and fixtures.
    #[must_use]
    pub fn text(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            options: Vec::new(),
            input_config: None,
            handler: None,
            navigation: None,
            action: FrameAction::Con,
            on_back: None,
            on_home: None,
            on_exit: None,
        }
    }
}

/// One selectable option of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuOption {
    /// Display text.
    pub text: String,

    /// Visibility/eligibility condition.
    #[serde(default)]
    pub condition: Option<Condition>,

    /// Slot-store directives: slot name → dotted context path, falling
    /// back to the literal string when the path does not resolve.
    #[serde(default)]
    pub store: Option<BTreeMap<String, String>>,

    /// Declarative action to execute on selection.
    #[serde(default)]
    pub action: Option<MenuAction>,

    /// Handler to invoke on selection.
    #[serde(default)]
    pub handler: Option<String>,

    /// Menu to route to on selection.
    #[serde(default)]
    pub next_menu: Option<String>,
}

/// Declarative option action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MenuAction {
    /// Call the upstream backend.
    #[serde(rename_all = "camelCase")]
    ApiCall {
        /// Upstream service name.
        service: String,

        /// `KEY:VALUE:` data template; placeholders are substituted
        /// against the context before the call.
        #[serde(default)]
        data: String,

        /// Slot to store the decoded response data under.
        #[serde(default)]
        store_as: Option<String>,

        /// Menu to route to when the call succeeds.
        #[serde(default)]
        next_menu_on_success: Option<String>,

        /// Menu to re-prompt when the call fails.
        #[serde(default)]
        next_menu_on_error: Option<String>,
    },
}

/// Free-form input configuration of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputConfig {
    /// Validation rule applied before anything else.
    #[serde(default)]
    pub validation: Option<ValidationRule>,

    /// Transform applied after validation.
    #[serde(default)]
    pub transform: Option<Transform>,

    /// Slot to store the (transformed) input under.
    #[serde(default)]
    pub store_key: Option<String>,

    /// Handler invoked with the transformed input.
    #[serde(default)]
    pub handler: Option<String>,

    /// Menu to route to.
    #[serde(default)]
    pub next_menu: Option<String>,
}

/// Literal-input navigation of a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Navigation {
    /// Target for the reserved back input (`"0"`).
    #[serde(default)]
    pub on_back: Option<String>,

    /// Target for the reserved home input (`"00"`).
    #[serde(default)]
    pub on_home: Option<String>,

    /// Target for the reserved exit input (`"000"`).
    #[serde(default)]
    pub on_exit: Option<String>,

    /// Exact-match routes for any other literal input.
    #[serde(flatten)]
    pub routes: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frame_wire_format() {
        assert_eq!(Frame::con("Hello").to_wire(), "con Hello");
        assert_eq!(Frame::end("Goodbye").to_wire(), "end Goodbye");
    }

    #[test]
    fn test_menu_node_deserializes_camel_case() {
        let node: MenuNode = serde_json::from_value(json!({
            "message": "Pick an account",
            "options": [
                {"text": "Balance", "nextMenu": "balance_accounts"},
                {
                    "text": "Authenticated only",
                    "condition": {"field": "session.authStatus", "operator": "equals", "value": "authenticated"}
                }
            ],
            "navigation": {"onBack": "home", "9": "help"},
            "inputConfig": {"validation": {"type": "pin"}, "storeKey": "pin_attempt"}
        }))
        .unwrap();

        assert_eq!(node.action, FrameAction::Con);
        assert_eq!(node.options.len(), 2);
        assert_eq!(node.options[0].next_menu.as_deref(), Some("balance_accounts"));
        assert!(node.options[1].condition.is_some());

        let nav = node.navigation.unwrap();
        assert_eq!(nav.on_back.as_deref(), Some("home"));
        assert_eq!(nav.routes.get("9").map(String::as_str), Some("help"));

        let input = node.input_config.unwrap();
        assert_eq!(input.store_key.as_deref(), Some("pin_attempt"));
    }

    #[test]
    fn test_api_call_action_deserializes() {
        let action: MenuAction = serde_json::from_value(json!({
            "type": "api_call",
            "service": "B-",
            "data": "BANKACCOUNTID:{data.account}:",
            "nextMenuOnSuccess": "balance_result",
            "nextMenuOnError": "balance_accounts"
        }))
        .unwrap();

        let MenuAction::ApiCall {
            service,
            next_menu_on_success,
            ..
        } = action;
        assert_eq!(service, "B-");
        assert_eq!(next_menu_on_success.as_deref(), Some("balance_result"));
    }

    #[test]
    fn test_end_action_deserializes() {
        let node: MenuNode =
            serde_json::from_value(json!({"message": "Bye", "action": "end"})).unwrap();
        assert_eq!(node.action, FrameAction::End);
    }

    #[test]
    fn test_step_result_helpers() {
        let invalid = StepResult::invalid("home");
        assert!(invalid.is_error());
        assert_eq!(invalid.retry_menu.as_deref(), Some("home"));

        let next = StepResult::next("main_menu");
        assert!(!next.is_error());
        assert_eq!(next.next_menu.as_deref(), Some("main_menu"));
    }
}
