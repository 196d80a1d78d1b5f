//! Shared value formatting helpers for tool output and prompt rendering

use serde_json::{Number, Value};

/// Largest magnitude for which an `f64` still holds every integer exactly.
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_991.0;

/// Renders a JSON number the way a client expects to read it back:
/// integral values without a fractional part, everything else in shortest form.
pub fn format_number(number: &Number) -> String {
    if let Some(value) = number.as_i64() {
        return value.to_string();
    }
    if let Some(value) = number.as_u64() {
        return value.to_string();
    }

    format_float(number.as_f64().unwrap_or(f64::NAN))
}

pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_EXACT_FLOAT_INT {
        return format!("{}", value as i64);
    }

    value.to_string()
}

/// Sums two JSON numbers, staying in integer arithmetic when both sides allow it.
pub fn add_numbers(left: &Number, right: &Number) -> String {
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        if let Some(sum) = a.checked_add(b) {
            return sum.to_string();
        }
    }

    let a = left.as_f64().unwrap_or(f64::NAN);
    let b = right.as_f64().unwrap_or(f64::NAN);
    format_float(a + b)
}

/// Plain-text rendering of an argument value for template substitution.
pub fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => format_number(number),
        Value::Bool(flag) => flag.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
