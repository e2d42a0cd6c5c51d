//! JCS-profile canonical JSON emission over `serde_json::Value`.

use std::fmt::Write as _;

use serde_json::Value;
use thiserror::Error;
use unicode_normalization::{UnicodeNormalization, is_nfc};

/// Maximum recursion depth for canonicalization to prevent stack
/// overflow from adversarial input.
pub const MAX_DEPTH: usize = 128;

/// Errors that can occur during canonicalization.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CanonicalError {
    /// A floating-point number was encountered.
    ///
    /// The canonical profile requires integer-only numbers so output is
    /// identical across platforms.
    #[error("float not allowed: canonical JSON requires integer-only numbers")]
    FloatNotAllowed,

    /// A number is outside the signed 64-bit integer range.
    #[error("number out of range: {value} is outside signed 64-bit integer range")]
    NumberOutOfRange {
        /// String representation of the out-of-range number.
        value: String,
    },

    /// A string is not in Unicode NFC normalized form.
    #[error("non-NFC string at path '{path}'")]
    NonNfcString {
        /// JSON path to the non-NFC string.
        path: String,
    },

    /// The maximum nesting depth was exceeded.
    #[error("max depth exceeded: JSON nested deeper than {max_depth} levels")]
    MaxDepthExceeded {
        /// The maximum depth that was exceeded.
        max_depth: usize,
    },
}

/// Canonicalizes a JSON value to its deterministic string form.
///
/// # Errors
///
/// Returns [`CanonicalError`] if the value contains floats, numbers
/// outside i64 range, non-NFC strings, or nesting deeper than
/// [`MAX_DEPTH`].
pub fn canonicalize(value: &Value) -> Result<String, CanonicalError> {
    validate_value(value, "$", 0)?;
    let mut output = String::new();
    emit_value(value, &mut output);
    Ok(output)
}

/// Canonicalizes a JSON value and returns the UTF-8 bytes.
///
/// # Errors
///
/// Same as [`canonicalize`].
pub fn canonical_bytes(value: &Value) -> Result<Vec<u8>, CanonicalError> {
    canonicalize(value).map(String::into_bytes)
}

/// Validates a value against the canonical profile constraints.
fn validate_value(value: &Value, path: &str, depth: usize) -> Result<(), CanonicalError> {
    if depth > MAX_DEPTH {
        return Err(CanonicalError::MaxDepthExceeded {
            max_depth: MAX_DEPTH,
        });
    }

    match value {
        Value::Null | Value::Bool(_) => Ok(()),
        Value::Number(n) => {
            if n.is_f64() {
                return Err(CanonicalError::FloatNotAllowed);
            }
            if let Some(u) = n.as_u64() {
                if u > i64::MAX as u64 {
                    return Err(CanonicalError::NumberOutOfRange {
                        value: n.to_string(),
                    });
                }
            }
            Ok(())
        }
        Value::String(s) => {
            if !is_nfc(s) {
                return Err(CanonicalError::NonNfcString {
                    path: path.to_string(),
                });
            }
            Ok(())
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                validate_value(item, &format!("{path}[{i}]"), depth + 1)?;
            }
            Ok(())
        }
        Value::Object(map) => {
            for (key, val) in map {
                if !is_nfc(key) {
                    return Err(CanonicalError::NonNfcString {
                        path: format!("{path}.{key}"),
                    });
                }
                validate_value(val, &format!("{path}.{key}"), depth + 1)?;
            }
            Ok(())
        }
    }
}

/// Emits a validated value in canonical form.
fn emit_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => {
            // Integers only; validated above. serde_json prints i64/u64
            // without leading zeros or exponents.
            let _ = write!(out, "{n}");
        }
        Value::String(s) => emit_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                emit_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            // Sort keys by UTF-8 byte order for deterministic output.
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable_by(|a, b| a.as_bytes().cmp(b.as_bytes()));

            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                emit_string(key, out);
                out.push(':');
                emit_value(&map[key.as_str()], out);
            }
            out.push('}');
        }
    }
}

/// Emits a string with minimal escaping per RFC 8785 §3.2.2.2.
fn emit_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.nfc() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{0009}' => out.push_str("\\t"),
            '\u{000A}' => out.push_str("\\n"),
            '\u{000C}' => out.push_str("\\f"),
            '\u{000D}' => out.push_str("\\r"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_keys_sorted() {
        let value = json!({"zebra": 1, "apple": 2, "mango": 3});
        assert_eq!(
            canonicalize(&value).unwrap(),
            r#"{"apple":2,"mango":3,"zebra":1}"#
        );
    }

    #[test]
    fn test_nested_objects_sorted() {
        let value = json!({"b": {"y": 1, "x": 2}, "a": [{"q": 1, "p": 2}]});
        assert_eq!(
            canonicalize(&value).unwrap(),
            r#"{"a":[{"p":2,"q":1}],"b":{"x":2,"y":1}}"#
        );
    }

    #[test]
    fn test_float_rejected() {
        let value = json!({"share": 0.15});
        assert!(matches!(
            canonicalize(&value),
            Err(CanonicalError::FloatNotAllowed)
        ));
    }

    #[test]
    fn test_u64_above_i64_max_rejected() {
        let value = json!({"n": u64::MAX});
        assert!(matches!(
            canonicalize(&value),
            Err(CanonicalError::NumberOutOfRange { .. })
        ));
    }

    #[test]
    fn test_depth_limit() {
        let mut value = json!(1);
        for _ in 0..=MAX_DEPTH {
            value = json!([value]);
        }
        assert!(matches!(
            canonicalize(&value),
            Err(CanonicalError::MaxDepthExceeded { .. })
        ));
    }

    #[test]
    fn test_control_char_escapes() {
        let value = json!({"s": "a\nb\tc\u{0001}d"});
        assert_eq!(
            canonicalize(&value).unwrap(),
            "{\"s\":\"a\\nb\\tc\\u0001d\"}"
        );
    }

    #[test]
    fn test_empty_containers() {
        assert_eq!(canonicalize(&json!({})).unwrap(), "{}");
        assert_eq!(canonicalize(&json!([])).unwrap(), "[]");
        assert_eq!(canonicalize(&json!(null)).unwrap(), "null");
    }

    proptest! {
        /// Key insertion order never affects canonical output.
        #[test]
        fn prop_key_order_irrelevant(
            keys in proptest::collection::btree_set("[a-z]{1,8}", 1..8),
            values in proptest::collection::vec(0i64..1000, 8),
        ) {
            let pairs: Vec<(String, i64)> = keys
                .iter()
                .cloned()
                .zip(values.iter().copied())
                .collect();

            let forward: serde_json::Map<String, Value> = pairs
                .iter()
                .map(|(k, v)| (k.clone(), json!(v)))
                .collect();
            let reverse: serde_json::Map<String, Value> = pairs
                .iter()
                .rev()
                .map(|(k, v)| (k.clone(), json!(v)))
                .collect();

            prop_assert_eq!(
                canonicalize(&Value::Object(forward)).unwrap(),
                canonicalize(&Value::Object(reverse)).unwrap()
            );
        }

        /// Canonical output is a fixpoint: re-parsing and
        /// re-canonicalizing yields identical bytes.
        #[test]
        fn prop_canonical_fixpoint(
            keys in proptest::collection::btree_set("[a-z]{1,6}", 0..6),
        ) {
            let map: serde_json::Map<String, Value> = keys
                .into_iter()
                .enumerate()
                .map(|(i, k)| (k, json!(i as i64)))
                .collect();
            let canonical = canonicalize(&Value::Object(map)).unwrap();
            let reparsed: Value = serde_json::from_str(&canonical).unwrap();
            prop_assert_eq!(canonical, canonicalize(&reparsed).unwrap());
        }
    }
}
