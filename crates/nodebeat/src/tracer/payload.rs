use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `GET /v1/chain/get_info`.
///
/// Keys the node leaves out decode to zero values; anything that is not a
/// JSON object is a decode error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthPayload {
    pub server_version: String,
    pub head_block_num: u64,
    pub head_block_producer: String,
    pub head_block_time: String,
    pub head_block_id: String,
    pub last_irreversible_block_num: u64,
}

impl HealthPayload {
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        match serde_json::from_slice::<Value>(body)? {
            value @ Value::Object(_) => serde_json::from_value(value),
            other => Err(serde_json::Error::custom(format!(
                "expected a JSON object, found {}",
                kind(&other)
            ))),
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
