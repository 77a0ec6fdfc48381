use crate::{
    Result,
    error::Error,
    normalize::{
        field,
        first_record,
        to_array,
    },
};
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;

/// Composite status snapshot exactly as the remote service returned it.
///
/// Every section stays a raw [`Value`]; absent sections read as `Null`. The
/// cache owns instances behind an `Arc` and nothing mutates them afterwards.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawStatusPayload {
    #[serde(default)]
    pub timestamp: Value,
    #[serde(default)]
    pub profile: Value,
    #[serde(default)]
    pub calculation: Value,
    #[serde(default)]
    pub addresses: Value,
    #[serde(default)]
    pub hub: Value,
    #[serde(default)]
    pub lotteries: Value,
    #[serde(default)]
    pub deposit: Value,
    #[serde(default)]
    pub treasury: Value,
}

impl RawStatusPayload {
    /// Rejects anything that is not a JSON object.
    pub fn from_value(url: &str, value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(Error::malformed(
                url,
                format!("expected a status object, got {}", kind_of(&value)),
            ));
        }
        serde_json::from_value(value).map_err(|e| Error::malformed(url, e))
    }

    pub fn lottery_entries(&self) -> &[Value] {
        to_array(&self.lotteries)
    }

    pub fn calculation(&self, key: &str) -> &Value {
        field(&self.calculation, key)
    }

    pub fn deposit(&self, key: &str) -> &Value {
        field(&self.deposit, key)
    }

    pub fn treasury(&self, key: &str) -> &Value {
        field(&self.treasury, key)
    }

    pub fn subscription(&self, key: &str) -> &Value {
        field(self.deposit("subscription_info"), key)
    }

    /// Contract details may arrive as one object or as a list of them.
    pub fn contract_details(&self, key: &str) -> &Value {
        first_record(self.deposit("contract_details"))
            .and_then(|record| record.get(key))
            .unwrap_or(&Value::Null)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[allow(non_snake_case)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_value__missing_sections_read_as_null() {
        // given
        let value = json!({ "timestamp": "2024-04-12T12:00:00Z", "extra": 1 });

        // when
        let payload = RawStatusPayload::from_value("/status", value).unwrap();

        // then
        assert_eq!(payload.timestamp, json!("2024-04-12T12:00:00Z"));
        assert_eq!(payload.deposit, Value::Null);
        assert!(payload.lottery_entries().is_empty());
    }

    #[test]
    fn from_value__rejects_non_object_bodies() {
        // when
        let err = RawStatusPayload::from_value("/status", json!([1, 2])).unwrap_err();

        // then
        assert!(matches!(err, Error::MalformedPayload { .. }));
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn contract_details__reads_first_entry_of_list() {
        // given
        let payload = RawStatusPayload::from_value(
            "/status",
            json!({ "deposit": { "contract_details": [{ "verification_gas_value": "7000" }] } }),
        )
        .unwrap();

        // then
        assert_eq!(payload.contract_details("verification_gas_value"), &json!("7000"));
    }
}
