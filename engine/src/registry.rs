//! Handler registry and per-turn state.
//!
//! Action modules register their handlers under `"{module}.{method}"`
//! names at bootstrap; an alias table maps the short names menu files use.
//! The map is frozen after registration, so the hot path is a single map
//! lookup with no reflection.

use crate::menu::StepResult;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use ussd_gateway_core::{Result, Session, SessionKey};

/// Mutable state of one turn.
///
/// Carries the session record, the composite key for slot access, and the
/// rendering context `{customer, session, data, transaction}`. The
/// rendered-handler set is the one-shot guard: a node handler invoked
/// during render is not invoked again by a re-render in the same turn.
#[derive(Debug, Clone)]
pub struct Turn {
    /// Composite session key.
    pub key: SessionKey,

    /// Session record as read at the start of the turn.
    pub session: Session,

    /// Rendering context.
    pub context: Value,

    rendered_handlers: HashSet<String>,
}

impl Turn {
    /// Start a turn.
    #[must_use]
    pub fn new(key: SessionKey, session: Session, context: Value) -> Self {
        Self {
            key,
            session,
            context,
            rendered_handlers: HashSet::new(),
        }
    }

    /// Record that a node's render handler ran this turn.
    pub fn mark_rendered(&mut self, menu: &str) {
        self.rendered_handlers.insert(menu.to_string());
    }

    /// `true` if the node's render handler already ran this turn.
    #[must_use]
    pub fn was_rendered(&self, menu: &str) -> bool {
        self.rendered_handlers.contains(menu)
    }

    /// Merge a value into the `data` section of the context.
    pub fn put_data(&mut self, field: &str, value: Value) {
        if let Some(data) = self
            .context
            .get_mut("data")
            .and_then(Value::as_object_mut)
        {
            data.insert(field.to_string(), value);
        }
    }
}

/// An action module handler.
///
/// Invoked with `None` input on render and `Some(value)` on process.
/// Returning `Ok(None)` means the handler has nothing to say and the
/// engine falls through to the node's declarative behaviour.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Handle one invocation.
    async fn handle(&self, input: Option<&str>, turn: &mut Turn) -> Result<Option<StepResult>>;
}

/// Frozen name → handler map with an alias table.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
    aliases: HashMap<String, String>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its full `"{module}.{method}"` name.
    pub fn register(&mut self, name: &str, handler: Arc<dyn ActionHandler>) {
        if self.handlers.insert(name.to_string(), handler).is_some() {
            tracing::warn!(handler = name, "Handler re-registered; last wins");
        } else {
            tracing::debug!(handler = name, "Registered handler");
        }
    }

    /// Map a short name to a full handler name.
    pub fn alias(&mut self, short: &str, full: &str) {
        self.aliases.insert(short.to_string(), full.to_string());
    }

    /// Resolve a name, consulting aliases first.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn ActionHandler>> {
        let resolved = self.aliases.get(name).map_or(name, String::as_str);
        self.handlers.get(resolved).cloned()
    }

    /// Registered handler count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// `true` if no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Invoke a handler by name.
    ///
    /// Returns `None` when the handler declined to produce a result. A
    /// missing handler or a handler error comes back as a uniform failure
    /// result rather than propagating.
    pub async fn invoke(
        &self,
        name: &str,
        input: Option<&str>,
        turn: &mut Turn,
    ) -> Option<StepResult> {
        let Some(handler) = self.lookup(name) else {
            tracing::warn!(handler = name, "Handler not registered");
            return Some(StepResult {
                error: Some("HANDLER_NOT_FOUND".to_string()),
                error_message: Some("Service temporarily unavailable. Please try again.".to_string()),
                ..StepResult::default()
            });
        };

        match handler.handle(input, turn).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(handler = name, error = %e, "Handler failed");
                Some(StepResult {
                    error: Some("HANDLER_ERROR".to_string()),
                    error_message: Some(
                        "Service temporarily unavailable. Please try again.".to_string(),
                    ),
                    ..StepResult::default()
                })
            }
        }
    }
}
