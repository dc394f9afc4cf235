//! Numeric extraction from heterogeneously-encoded stored values.
//!
//! Run rows accumulated under older writers hold predictions and actuals in
//! several encodings: raw numbers, numeric strings, JSON-encoded scalars, and
//! occasionally doubly JSON-encoded strings of JSON. New rows are written in
//! one canonical encoding, but reads have to stay tolerant of the legacy
//! shapes, so all numeric access goes through [`normalize`].

use serde_json::Value;

/// Conventional wrapper keys probed, in order, when a stored value decodes to
/// an object.
const CONVENTIONAL_KEYS: &[&str] = &["value", "result", "prediction", "y", "pred"];

/// Extract a numeric scalar from a stored value.
///
/// Returns `None` for anything unparseable; never panics and never errors.
/// Strings are given up to two rounds of JSON decoding to cope with
/// double-encoded legacy rows.
pub fn normalize(raw: &Value) -> Option<f64> {
    extract(raw, 2)
}

fn extract(value: &Value, decode_budget: u8) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            if let Some(n) = parse_numeric(s) {
                return Some(n);
            }
            if decode_budget == 0 {
                return None;
            }
            let decoded: Value = serde_json::from_str(s).ok()?;
            extract(&decoded, decode_budget - 1)
        }
        Value::Object(map) => CONVENTIONAL_KEYS.iter().find_map(|key| map.get(*key).and_then(scalar_number)),
        Value::Array(items) if items.len() == 1 => scalar_number(&items[0]),
        _ => None,
    }
}

/// Numeric check for already-unwrapped values: numbers and numeric strings
/// only, no further decoding.
fn scalar_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_numeric(s),
        _ => None,
    }
}

fn parse_numeric(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_native_number() {
        assert_eq!(normalize(&json!(12.3)), Some(12.3));
        assert_eq!(normalize(&json!(7)), Some(7.0));
    }

    #[test]
    fn test_numeric_string() {
        assert_eq!(normalize(&json!("12.3")), Some(12.3));
        assert_eq!(normalize(&json!(" 12.3 ")), Some(12.3));
        assert_eq!(normalize(&json!("-4")), Some(-4.0));
    }

    #[test]
    fn test_json_wrapped_object() {
        assert_eq!(normalize(&json!({"value": 12.3})), Some(12.3));
        assert_eq!(normalize(&json!({"prediction": "8.5"})), Some(8.5));
        // String containing JSON, the common stored shape
        assert_eq!(normalize(&json!(r#"{"value":12.3}"#)), Some(12.3));
    }

    #[test]
    fn test_object_key_probe_order() {
        // `value` wins over `result` regardless of insertion order
        assert_eq!(normalize(&json!({"result": 1.0, "value": 2.0})), Some(2.0));
        assert_eq!(normalize(&json!({"pred": 1.0, "y": 2.0})), Some(2.0));
    }

    #[test]
    fn test_singleton_array() {
        assert_eq!(normalize(&json!([12.3])), Some(12.3));
        assert_eq!(normalize(&json!(["12.3"])), Some(12.3));
        assert_eq!(normalize(&json!("[12.3]")), Some(12.3));
        // Multi-element sequences are ambiguous, not unwrapped
        assert_eq!(normalize(&json!([1.0, 2.0])), None);
        // Nesting stops at one level of unwrapping
        assert_eq!(normalize(&json!([[12.3]])), None);
    }

    #[test]
    fn test_double_encoded_string() {
        // json_encode(json_encode("12.3")) style legacy rows
        assert_eq!(normalize(&json!("\"12.3\"")), Some(12.3));
        assert_eq!(normalize(&json!("\"{\\\"value\\\":12.3}\"")), Some(12.3));
        // Three levels of wrapping is past the tolerance budget
        assert_eq!(normalize(&json!("\"\\\"\\\\\\\"12.3\\\\\\\"\\\"\"")), None);
    }

    #[test]
    fn test_unparseable_yields_none() {
        assert_eq!(normalize(&Value::Null), None);
        assert_eq!(normalize(&json!("garbage")), None);
        assert_eq!(normalize(&json!({"unrelated": 1.0})), None);
        assert_eq!(normalize(&json!(true)), None);
        assert_eq!(normalize(&json!("NaN")), None);
        assert_eq!(normalize(&json!("inf")), None);
    }
}
