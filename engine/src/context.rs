//! Dotted-path resolution over the rendering context.
//!
//! The context is a JSON object of the shape `{customer, session, data,
//! transaction}`; templates, conditions and store directives all address
//! into it with `dotted.path` expressions.

use serde_json::Value;

/// Resolve a dotted path against a context value.
///
/// Returns `None` when any segment is missing or the parent is not an
/// object. Explicit `null` resolves to `None` as well, so conditions treat
/// it as absent.
#[must_use]
pub fn resolve_path<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = context;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }

    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Render a value for display inside a message.
///
/// Strings render unquoted; everything else uses its JSON form.
#[must_use]
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Substitute `{dotted.path}` placeholders in a template.
///
/// Unresolvable placeholders render as an empty string.
#[must_use]
pub fn substitute(template: &str, context: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        match after.find('}') {
            Some(close) => {
                let path = &after[..close];
                if let Some(value) = resolve_path(context, path) {
                    out.push_str(&display_value(value));
                }
                rest = &after[close + 1..];
            }
            None => {
                // Unbalanced brace: emit the remainder verbatim.
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
