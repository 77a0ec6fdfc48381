//! Conversions from the loosely-typed wire representation into canonical
//! values: decimal-string amounts, integer basis points, and millisecond
//! precision UTC timestamps.

use crate::error::ValidationError;
use chrono::{
    DateTime,
    NaiveDate,
    NaiveDateTime,
    SecondsFormat,
    Utc,
};
use serde_json::{
    Map,
    Value,
};

pub type JsonRecord = Map<String, Value>;

pub const DEFAULT_VRF_LOG_LIMIT: u32 = 25;
pub const MAX_VRF_LOG_LIMIT: u32 = 500;
pub const DEFAULT_CHAT_LIMIT: u32 = 50;
pub const MAX_CHAT_LIMIT: u32 = 200;
pub const DEFAULT_ANNOUNCEMENT_LIMIT: u32 = 20;
pub const MAX_ANNOUNCEMENT_LIMIT: u32 = 100;
pub const DEFAULT_CHAT_ROOM: &str = "global";

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

pub fn as_record(value: &Value) -> Option<&JsonRecord> {
    value.as_object()
}

/// Looks up `key` on `value` when it is an object; `Null` otherwise.
pub fn field<'a>(value: &'a Value, key: &str) -> &'a Value {
    value.get(key).unwrap_or(&Value::Null)
}

/// First element of an array, or the value itself, as long as it is an object.
pub fn first_record(value: &Value) -> Option<&JsonRecord> {
    match value {
        Value::Array(items) => items.first().and_then(Value::as_object),
        other => other.as_object(),
    }
}

/// Arrays as-is; an object wrapping exactly one array is unwrapped.
pub fn to_array(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) if map.len() == 1 => match map.values().next() {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    }
}

pub fn string_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Non-empty trimmed string form.
pub fn trimmed_string_of(value: &Value) -> Option<String> {
    string_of(value)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn string_array(value: &Value) -> Vec<String> {
    to_array(value)
        .iter()
        .filter_map(string_of)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Non-negative integer from a number, a digit string, or a bool.
pub fn integer_of(value: &Value) -> Option<u128> {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                return Some(v as u128);
            }
            let f = n.as_f64()?;
            (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f < u128::MAX as f64)
                .then_some(f as u128)
        }
        Value::String(s) => {
            let digits = s.trim();
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            digits.parse::<u128>().ok()
        }
        Value::Bool(b) => Some(u128::from(*b)),
        _ => None,
    }
}

pub fn u32_of(value: &Value) -> Option<u32> {
    integer_of(value).and_then(|v| u32::try_from(v).ok())
}

pub fn u64_of(value: &Value) -> Option<u64> {
    integer_of(value).and_then(|v| u64::try_from(v).ok())
}

/// Decimal-string big integer. Digit strings of any length are kept verbatim
/// apart from leading zeros, so values beyond `u128` survive untouched.
pub fn amount_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let digits = s.trim();
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let stripped = digits.trim_start_matches('0');
            Some(if stripped.is_empty() {
                "0".to_string()
            } else {
                stripped.to_string()
            })
        }
        Value::Bool(_) => None,
        other => integer_of(other).map(|v| v.to_string()),
    }
}

pub fn amount_or_zero(value: &Value) -> String {
    amount_of(value).unwrap_or_else(|| "0".to_string())
}

pub fn bool_of(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => parse_timestamp_str(raw.trim()),
        Value::Number(n) => {
            let seconds = n.as_f64()?;
            if !seconds.is_finite() {
                return None;
            }
            DateTime::from_timestamp_millis((seconds * 1000.0).round() as i64)
        }
        _ => None,
    }
}

fn parse_timestamp_str(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Canonical `YYYY-MM-DDTHH:MM:SS.sssZ`, or `None` for null / unparseable.
pub fn normalize_timestamp(value: &Value) -> Option<String> {
    parse_timestamp(value).map(format_timestamp)
}

pub fn timestamp_or_now(value: &Value, now: DateTime<Utc>) -> String {
    normalize_timestamp(value).unwrap_or_else(|| format_timestamp(now))
}

/// Routing keys are trimmed and lower-cased; blank means the global room.
pub fn normalize_room(room: Option<&str>) -> String {
    match room.map(str::trim) {
        Some(trimmed) if !trimmed.is_empty() => trimmed.to_lowercase(),
        _ => DEFAULT_CHAT_ROOM.to_string(),
    }
}

pub fn clamp_vrf_limit(limit: Option<i64>) -> u32 {
    match limit {
        Some(requested) if requested > 0 => {
            requested.min(i64::from(MAX_VRF_LOG_LIMIT)) as u32
        }
        _ => DEFAULT_VRF_LOG_LIMIT,
    }
}

pub fn clamp_chat_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_CHAT_LIMIT).clamp(1, MAX_CHAT_LIMIT)
}

pub fn clamp_announcement_limit(limit: Option<u32>) -> u32 {
    limit
        .unwrap_or(DEFAULT_ANNOUNCEMENT_LIMIT)
        .clamp(1, MAX_ANNOUNCEMENT_LIMIT)
}

/// A single command-line argument value; blank strings are rejected.
pub fn cli_value(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::invalid(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

#[allow(non_snake_case)]
#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn normalize_timestamp__canonicalises_supported_inputs() {
        let cases = [
            (json!("2024-04-12T12:00:00Z"), Some("2024-04-12T12:00:00.000Z")),
            (
                json!("2024-04-12T12:00:00.123456+02:00"),
                Some("2024-04-12T10:00:00.123Z"),
            ),
            (json!("2024-04-12"), Some("2024-04-12T00:00:00.000Z")),
            (json!("2024-04-12 08:30:00"), Some("2024-04-12T08:30:00.000Z")),
            (json!(1_712_923_200), Some("2024-04-12T12:00:00.000Z")),
            (json!(null), None),
            (json!("yesterday"), None),
        ];
        for (input, expected) in cases {
            assert_eq!(
                normalize_timestamp(&input).as_deref(),
                expected,
                "input {input}"
            );
        }
    }

    #[test]
    fn amount_of__keeps_decimal_strings_beyond_u128() {
        // given
        let huge = "340282366920938463463374607431768211456000";

        // when
        let amount = amount_of(&json!(huge));

        // then
        assert_eq!(amount.as_deref(), Some(huge));
    }

    #[test]
    fn amount_of__rejects_non_numeric_and_fractional_values() {
        assert_eq!(amount_of(&json!("12.5")), None);
        assert_eq!(amount_of(&json!(12.5)), None);
        assert_eq!(amount_of(&json!("-3")), None);
        assert_eq!(amount_of(&json!(true)), None);
        assert_eq!(amount_of(&json!("0007")).as_deref(), Some("7"));
        assert_eq!(amount_or_zero(&Value::Null), "0");
    }

    #[test]
    fn bool_of__accepts_textual_flags() {
        assert_eq!(bool_of(&json!("Yes")), Some(true));
        assert_eq!(bool_of(&json!(" off ")), Some(false));
        assert_eq!(bool_of(&json!(0)), Some(false));
        assert_eq!(bool_of(&json!("maybe")), None);
    }

    #[test]
    fn to_array__unwraps_single_key_object() {
        let wrapped = json!({ "vec": [1, 2, 3] });
        assert_eq!(to_array(&wrapped).len(), 3);
        assert!(to_array(&json!({ "a": [1], "b": [2] })).is_empty());
    }

    #[test]
    fn normalize_room__trims_and_lowercases() {
        assert_eq!(normalize_room(Some(" Global ")), "global");
        assert_eq!(normalize_room(Some("   ")), "global");
        assert_eq!(normalize_room(None), "global");
        assert_eq!(normalize_room(Some("Lottery-7")), "lottery-7");
    }

    #[test]
    fn clamp_vrf_limit__caps_and_defaults() {
        assert_eq!(clamp_vrf_limit(Some(9999)), 500);
        assert_eq!(clamp_vrf_limit(Some(0)), DEFAULT_VRF_LOG_LIMIT);
        assert_eq!(clamp_vrf_limit(Some(-4)), DEFAULT_VRF_LOG_LIMIT);
        assert_eq!(clamp_vrf_limit(None), DEFAULT_VRF_LOG_LIMIT);
        assert_eq!(clamp_vrf_limit(Some(1)), 1);
    }

    #[test]
    fn cli_value__rejects_blank_arguments() {
        assert_eq!(cli_value("maxGasPrice", " 11 ").unwrap(), "11");
        assert!(cli_value("maxGasPrice", "  ").is_err());
    }

    proptest! {
        #[test]
        fn clamp_vrf_limit__always_within_bounds(limit in any::<i64>()) {
            let clamped = clamp_vrf_limit(Some(limit));
            prop_assert!((1..=MAX_VRF_LOG_LIMIT).contains(&clamped));
        }

        #[test]
        fn amount_of__renders_integers_as_decimal_strings(value in any::<u64>()) {
            prop_assert_eq!(amount_of(&json!(value)), Some(value.to_string()));
            prop_assert_eq!(amount_of(&json!(value.to_string())), Some(value.to_string()));
        }
    }
}
