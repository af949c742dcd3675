//! Typed access to loosely typed API JSON objects.
//!
//! The API is inconsistent about scalar encodings: ids arrive as numbers or
//! numeric strings, flags as `0`/`1`, `"0"`/`"1"` or booleans, and
//! coordinates as numbers, strings or `null`.

use serde_json::Value;

use crate::error::{HarvesterError, Result};

/// Integral floats such as `12.0` pass; fractional or out-of-range ones don't.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn integral(f: f64) -> Option<i64> {
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.fract() == 0.0 && in_range).then_some(f as i64)
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok().filter(|f: &f64| f.is_finite()),
        _ => None,
    }
}

/// Required integer field.
pub fn required_i64(obj: &Value, field: &str, context: &str) -> Result<i64> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(HarvesterError::MissingField {
            field: field.to_string(),
            context: context.to_string(),
        }),
        Some(v) => as_i64(v).ok_or_else(|| HarvesterError::InvalidField {
            field: field.to_string(),
            context: context.to_string(),
            value: v.to_string(),
        }),
    }
}

/// Required non-null string field.
pub fn required_str<'a>(obj: &'a Value, field: &str, context: &str) -> Result<&'a str> {
    match obj.get(field) {
        Some(Value::String(s)) => Ok(s),
        None | Some(Value::Null) => Err(HarvesterError::MissingField {
            field: field.to_string(),
            context: context.to_string(),
        }),
        Some(v) => Err(HarvesterError::InvalidField {
            field: field.to_string(),
            context: context.to_string(),
            value: v.to_string(),
        }),
    }
}

/// Optional integer; absent, null and non-numeric all give `None`.
pub fn optional_i64(obj: &Value, field: &str) -> Option<i64> {
    obj.get(field).and_then(as_i64)
}

/// Optional float; absent, null and non-numeric all give `None`.
pub fn optional_f64(obj: &Value, field: &str) -> Option<f64> {
    obj.get(field).and_then(as_f64)
}

/// Coordinate where an explicit `null` means "known absent" (0.0) and a
/// missing key means "not delivered" (`None`).
pub fn coordinate(obj: &Value, field: &str) -> Option<f64> {
    match obj.get(field) {
        None => None,
        Some(Value::Null) => Some(0.0),
        Some(v) => Some(as_f64(v).unwrap_or(0.0)),
    }
}

/// Text field; absent or null give an empty string, scalars are stringified.
pub fn text(obj: &Value, field: &str) -> String {
    match obj.get(field) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(v) => v.to_string(),
    }
}

/// Boolean-ish flag. Non-zero numbers, `"1"`/`"true"` and `true` are set.
pub fn flag(obj: &Value, field: &str) -> bool {
    match obj.get(field) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => matches!(s.trim(), "1" | "true" | "True" | "TRUE"),
        _ => false,
    }
}

/// Like [`flag`] but with a value for absent/null.
pub fn flag_or(obj: &Value, field: &str, default: bool) -> bool {
    match obj.get(field) {
        None | Some(Value::Null) => default,
        Some(_) => flag(obj, field),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_required_i64_accepts_numeric_strings() {
        let obj = json!({"id": "4328310", "n": 5});
        assert_eq!(required_i64(&obj, "id", "t").unwrap(), 4_328_310);
        assert_eq!(required_i64(&obj, "n", "t").unwrap(), 5);
    }

    #[test]
    fn test_required_i64_errors() {
        let obj = json!({"id": null, "bad": "x1"});
        assert!(matches!(
            required_i64(&obj, "id", "t"),
            Err(HarvesterError::MissingField { .. })
        ));
        assert!(matches!(
            required_i64(&obj, "missing", "t"),
            Err(HarvesterError::MissingField { .. })
        ));
        assert!(matches!(
            required_i64(&obj, "bad", "t"),
            Err(HarvesterError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_required_i64_rejects_fractional_ids() {
        let obj = json!({"whole": 12.0, "frac": 12.5, "huge": 1e30});
        assert_eq!(required_i64(&obj, "whole", "t").unwrap(), 12);
        assert!(matches!(
            required_i64(&obj, "frac", "t"),
            Err(HarvesterError::InvalidField { .. })
        ));
        assert!(matches!(
            required_i64(&obj, "huge", "t"),
            Err(HarvesterError::InvalidField { .. })
        ));
        assert_eq!(optional_i64(&obj, "frac"), None);
    }

    #[test]
    fn test_coordinate_null_vs_missing() {
        let obj = json!({"latitude": null, "longitude": "37.5"});
        assert_eq!(coordinate(&obj, "latitude"), Some(0.0));
        assert_eq!(coordinate(&obj, "longitude"), Some(37.5));
        assert_eq!(coordinate(&obj, "altitude"), None);
    }

    #[test]
    fn test_optional_f64_rejects_non_numeric() {
        let obj = json!({"lat": "", "lon": "NaN", "ok": 1.5});
        assert_eq!(optional_f64(&obj, "lat"), None);
        assert_eq!(optional_f64(&obj, "lon"), None);
        assert_eq!(optional_f64(&obj, "ok"), Some(1.5));
    }

    #[test]
    fn test_flags() {
        let obj = json!({"a": 1, "b": "0", "c": true, "d": "1", "e": null});
        assert!(flag(&obj, "a"));
        assert!(!flag(&obj, "b"));
        assert!(flag(&obj, "c"));
        assert!(flag(&obj, "d"));
        assert!(!flag(&obj, "e"));
        assert!(flag_or(&obj, "e", true));
        assert!(flag_or(&obj, "missing", true));
        assert!(!flag_or(&obj, "b", true));
    }

    #[test]
    fn test_text() {
        let obj = json!({"s": "abc", "n": 42, "z": null});
        assert_eq!(text(&obj, "s"), "abc");
        assert_eq!(text(&obj, "n"), "42");
        assert_eq!(text(&obj, "z"), "");
        assert_eq!(text(&obj, "missing"), "");
    }
}
