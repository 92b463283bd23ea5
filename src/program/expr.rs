//! Helpers for building the engine's `${...}` runtime expressions.

use serde_json::Value;

/// Wraps an expression body: `expr("tg.contact.phone")` → `"${tg.contact.phone}"`.
pub fn expr(body: impl AsRef<str>) -> Value {
    Value::String(format!("${{{}}}", body.as_ref()))
}

/// A reference to a variable in the current routine.
pub fn var(name: &str) -> Value {
    expr(name)
}

/// Renders `text` as a string literal usable inside an expression body.
pub fn quote(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}

/// Returns the expression body if `value` is a `${...}` expression.
pub fn expression_body(value: &Value) -> Option<&str> {
    value
        .as_str()
        .and_then(|s| s.strip_prefix("${"))
        .and_then(|s| s.strip_suffix('}'))
}
