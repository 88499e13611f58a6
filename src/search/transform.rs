//! Value transforms for search handlers.

use serde_json::{Number, Value};

/// Accepts numeric text only, yielding a JSON number (integer when possible).
/// Anything else rejects the clause.
pub fn numeric_validate(value: &str) -> Option<Value> {
    let value = value.trim();
    if let Ok(i) = value.parse::<i64>() {
        return Some(Value::from(i));
    }
    value
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// Keeps at most `maximum` entries of an IN list.
pub fn trim_overflow(maximum: usize) -> impl Fn(Vec<String>) -> Vec<String> + Send + Sync + Clone + 'static {
    move |mut values| {
        values.truncate(maximum);
        values
    }
}
