//! Safe extractors over loosely-typed decoded JSON (spec §4.1), and the two query-string
//! builders venues disagree about.
//!
//! Every extractor treats a missing key, an explicit `null`, and the empty string as "absent"
//! and falls back to a caller-supplied default rather than erroring — venue payloads are
//! semi-structured and a missing optional field is routine, not exceptional.

use serde_json::Value;
use std::collections::BTreeMap;

fn present(value: &Value) -> Option<&Value> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        other => Some(other),
    }
}

fn as_str_loose(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_f64_loose(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn as_i64_loose(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.parse::<i64>().ok(),
        _ => None,
    }
}

/// Extracts `obj[key]` as an `f64`, returning `default` if the key is absent or unparseable.
pub fn safe_float(obj: &Value, key: &str, default: f64) -> f64 {
    obj.get(key)
        .and_then(present)
        .and_then(as_f64_loose)
        .unwrap_or(default)
}

/// Like [`safe_float`] but tries `key` then `fallback_key`.
pub fn safe_float2(obj: &Value, key: &str, fallback_key: &str, default: f64) -> f64 {
    obj.get(key)
        .and_then(present)
        .and_then(as_f64_loose)
        .or_else(|| obj.get(fallback_key).and_then(present).and_then(as_f64_loose))
        .unwrap_or(default)
}

/// Extracts `obj[key]` as an `Option<f64>`: `None` when absent, never defaulted to zero (spec
/// §4.10: absent numeric fields become `undefined`, never `0`).
pub fn safe_float_opt(obj: &Value, key: &str) -> Option<f64> {
    obj.get(key).and_then(present).and_then(as_f64_loose)
}

/// Extracts `obj[key]` as an `i64`, returning `default` if the key is absent or unparseable.
pub fn safe_int(obj: &Value, key: &str, default: i64) -> i64 {
    obj.get(key)
        .and_then(present)
        .and_then(as_i64_loose)
        .unwrap_or(default)
}

pub fn safe_int_opt(obj: &Value, key: &str) -> Option<i64> {
    obj.get(key).and_then(present).and_then(as_i64_loose)
}

/// Extracts `obj[key]` as a `String`, returning `default.to_owned()` if absent.
pub fn safe_string(obj: &Value, key: &str, default: &str) -> String {
    obj.get(key)
        .and_then(present)
        .and_then(as_str_loose)
        .unwrap_or_else(|| default.to_owned())
}

/// Like [`safe_string`] but tries `key` then `fallback_key` before defaulting.
pub fn safe_string2(obj: &Value, key: &str, fallback_key: &str, default: &str) -> String {
    obj.get(key)
        .and_then(present)
        .and_then(as_str_loose)
        .or_else(|| obj.get(fallback_key).and_then(present).and_then(as_str_loose))
        .unwrap_or_else(|| default.to_owned())
}

pub fn safe_string_opt(obj: &Value, key: &str) -> Option<String> {
    obj.get(key).and_then(present).and_then(as_str_loose)
}

/// [`safe_string`] then uppercased.
pub fn safe_string_upper(obj: &Value, key: &str, default: &str) -> String {
    safe_string(obj, key, default).to_uppercase()
}

/// [`safe_string`] then lowercased.
pub fn safe_string_lower(obj: &Value, key: &str, default: &str) -> String {
    safe_string(obj, key, default).to_lowercase()
}

/// Extracts `obj[key]` as a `bool`, treating the strings `"true"`/`"false"` loosely as well as
/// JSON booleans; returns `default` otherwise.
pub fn safe_bool(obj: &Value, key: &str, default: bool) -> bool {
    match obj.get(key).and_then(present) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => match s.as_str() {
            "true" => true,
            "false" => false,
            _ => default,
        },
        _ => default,
    }
}

/// Percent-encodes a single query component the way `serde_urlencoded` would for a form field.
fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Builds an alphabetized, percent-encoded, `&`-joined query string — general-purpose URL
/// composition used by most venue signers (spec §4.1).
pub fn build_encoded_query(params: &[(&str, String)]) -> String {
    let sorted: BTreeMap<&str, &String> = params.iter().map(|(k, v)| (*k, v)).collect();
    sorted
        .into_iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Builds a query string in original parameter order, with no percent-encoding — required for
/// Binance-family signature strings, which are signed before any encoding is applied.
pub fn build_raw_query(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_null_and_empty_string_are_all_absent() {
        let obj = json!({"a": null, "b": "", "c": "x"});
        assert_eq!(safe_float(&obj, "missing", 1.0), 1.0);
        assert_eq!(safe_float(&obj, "a", 1.0), 1.0);
        assert_eq!(safe_string(&obj, "b", "default"), "default");
        assert_eq!(safe_string(&obj, "c", "default"), "x");
    }

    #[test]
    fn float_parse_failure_falls_back_to_default() {
        let obj = json!({"x": "not-a-number"});
        assert_eq!(safe_float(&obj, "x", -1.0), -1.0);
    }

    #[test]
    fn two_key_fallback_returns_first_present() {
        let obj = json!({"alt": "42"});
        assert_eq!(safe_string2(&obj, "primary", "alt", "none"), "42");
        assert_eq!(safe_float2(&obj, "primary", "alt", 0.0), 42.0);
    }

    #[test]
    fn upper_lower_variants_case_fold() {
        let obj = json!({"side": "Buy"});
        assert_eq!(safe_string_upper(&obj, "side", ""), "BUY");
        assert_eq!(safe_string_lower(&obj, "side", ""), "buy");
    }

    #[test]
    fn safe_float_opt_never_defaults_to_zero() {
        let obj = json!({});
        assert_eq!(safe_float_opt(&obj, "missing"), None);
    }

    #[test]
    fn encoded_query_is_alphabetized_and_percent_encoded() {
        let params = vec![("b", "2".to_string()), ("a", "hello world".to_string())];
        assert_eq!(build_encoded_query(&params), "a=hello+world&b=2");
    }

    #[test]
    fn raw_query_preserves_order_and_skips_encoding() {
        let params = vec![("timestamp", "123".to_string()), ("symbol", "BTC USDT".to_string())];
        assert_eq!(build_raw_query(&params), "timestamp=123&symbol=BTC USDT");
    }
}
