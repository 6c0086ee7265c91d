//! On-disk node list schema.
//!
//! Every field is optional and every value is read leniently: a missing key,
//! a `null`, or a value of the wrong JSON type all become the empty string.
//! Numbers are accepted where strings are expected, so `"port_http": 8888`
//! and `"port_http": "8888"` load the same way.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Top level of a node list file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeListFile {
    #[serde(default, deserialize_with = "lenient_string")]
    pub network: String,

    #[serde(rename = "blockProducerList", default, deserialize_with = "lenient_entries")]
    pub block_producer_list: Vec<NodeEntry>,
}

/// One entry of `blockProducerList`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub bp_name: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub organisation: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub location: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub node_addr: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub port_http: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub port_ssl: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub port_p2p: String,

    /// `"lat,lon"` in decimal degrees.
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "String::is_empty")]
    pub coordinates: String,
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_to_string(Value::deserialize(deserializer)?))
}

fn lenient_entries<'de, D>(deserializer: D) -> Result<Vec<NodeEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(_) => serde_json::from_value(item).unwrap_or_default(),
                _ => NodeEntry::default(),
            })
            .collect(),
        _ => Vec::new(),
    };
    Ok(entries)
}
