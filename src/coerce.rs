//! Loose-input coercion.
//!
//! Profile documents arrive from a backend that stores whatever older editors
//! wrote, and form inputs arrive as raw strings. Everything in this module
//! turns those loose shapes into the canonical scalar types of the model
//! without ever failing: unusable input collapses to the field's default.

use serde_json::Value;

/// Parse the leading integer of a form value the way `parseInt(value, 10)` does.
///
/// Leading whitespace is skipped, one sign character is accepted, and parsing
/// stops at the first non-digit (`"12px"` is 12, `"3.9"` is 3). Returns `None`
/// when no digit is found or the number does not fit in an `i64`.
pub fn parse_int(input: &str) -> Option<i64> {
    let trimmed = input.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let magnitude: i64 = digits[..end].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Parse a list index coming from the UI. Negative or unparsable input is `None`.
pub fn parse_index(input: &str) -> Option<usize> {
    parse_int(input).and_then(|value| usize::try_from(value).ok())
}

/// Parse a non-negative millisecond/count input; unparsable input yields `fallback`,
/// negative input clamps to zero.
pub fn parse_u32_or(input: &str, fallback: u32) -> u32 {
    match parse_int(input) {
        Some(value) => clamp_u32(value),
        None => fallback,
    }
}

/// Checkbox/select coercion used by the form: only the literal `"true"` is true.
pub fn parse_bool_input(input: &str) -> bool {
    input == "true"
}

pub(crate) fn clamp_u32(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}

/// JavaScript truthiness of a JSON value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Text view of a scalar value; containers, `null` and `false` become `""`.
///
/// `true` reads as `"true"` but `false` as `""`, matching how a truthy
/// check followed by string conversion treats legacy flat fields.
pub fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "true".to_string(),
        _ => String::new(),
    }
}

/// Non-negative integer view of a scalar value.
pub fn uint_of(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_i64().map(|i| i.max(0) as u64))
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite())
                    .map(|f| f.max(0.0).trunc() as u64)
            }),
        Value::String(s) => parse_int(s).map(|i| i.max(0) as u64),
        _ => None,
    }
}

/// `deserialize_with` helpers that accept loosely typed JSON.
///
/// Each helper reads the raw [`Value`] first, so a wrong-typed field never
/// aborts deserialization of the surrounding record.
pub mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;
    use std::str::FromStr;
    use tracing::warn;

    use super::{is_truthy, text_of, uint_of};

    pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(text_of(&value))
    }

    /// Booleans, plus the `"true"`/`"false"` strings a form may have stored.
    pub fn boolean<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match &value {
            Value::String(s) if s == "false" || s == "0" => false,
            other => is_truthy(other),
        })
    }

    /// Like [`boolean`], but an explicit `null` counts as "not set" and yields `true`.
    pub fn boolean_or_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match &value {
            Value::Null => true,
            Value::String(s) if s == "false" || s == "0" => false,
            other => is_truthy(other),
        })
    }

    pub fn u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(uint_of(&value).map_or(0, |v| v.min(u64::from(u32::MAX)) as u32))
    }

    pub fn u8<'de, D>(deserializer: D) -> Result<u8, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(uint_of(&value).map_or(0, |v| v.min(u64::from(u8::MAX)) as u8))
    }

    /// A string parsed through `FromStr`; anything else is `None`.
    pub fn parsed<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: FromStr,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(value.as_str().and_then(|s| s.parse().ok()))
    }

    /// A nested record; non-objects and undecodable objects become `None`.
    pub fn object<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let value = Value::deserialize(deserializer)?;
        if !value.is_object() {
            return Ok(None);
        }
        match serde_json::from_value(value) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(error = %e, "dropping undecodable nested record");
                Ok(None)
            }
        }
    }

    pub fn object_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        object(deserializer).map(Option::unwrap_or_default)
    }

    /// A list of records. A non-array becomes empty; entries that cannot be
    /// decoded are dropped individually.
    pub fn seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let Value::Array(items) = Value::deserialize(deserializer)? else {
            return Ok(Vec::new());
        };
        Ok(items
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| match serde_json::from_value(item) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(index, error = %e, "dropping malformed list entry");
                    None
                }
            })
            .collect())
    }

    /// A positional list: entries that cannot be decoded become `T::default()`
    /// so later indices stay put.
    pub fn slots<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let Value::Array(items) = Value::deserialize(deserializer)? else {
            return Ok(Vec::new());
        };
        Ok(items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                serde_json::from_value(item).unwrap_or_else(|e| {
                    warn!(index, error = %e, "replacing malformed list entry with defaults");
                    T::default()
                })
            })
            .collect())
    }

    /// A list of strings; scalars are stringified, everything else dropped.
    pub fn strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Value::Array(items) = Value::deserialize(deserializer)? else {
            return Ok(Vec::new());
        };
        Ok(items
            .iter()
            .filter(|item| item.is_string() || item.is_number())
            .map(text_of)
            .collect())
    }
}
