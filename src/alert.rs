//! data structures for deserializing incoming alertmanager webhooks

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// one webhook delivery: a batch of alerts plus grouping metadata
///
/// Label and annotation maps are loosely typed because alertmanager relabel
/// configs can put anything in them. Lookups that feed message formatting or
/// button building only accept string values, everything else counts as
/// absent (see [string_value]).
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Data {
    pub receiver: String,
    pub status: String,
    pub alerts: Vec<Alert>,
    pub group_labels: HashMap<String, Value>,
    pub common_labels: HashMap<String, Value>,
    pub common_annotations: HashMap<String, Value>,
    #[serde(rename = "externalURL")]
    pub external_url: String,
}

/// one alert instance inside a batch
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Alert {
    pub status: String,
    pub labels: HashMap<String, Value>,
    pub annotations: HashMap<String, Value>,
    // kept as strings, the date formatting helper parses rfc3339 on demand
    pub starts_at: String,
    pub ends_at: String,
    #[serde(rename = "generatorURL")]
    pub generator_url: String,
}

/// Looks up `key` and returns the value only if it is string typed. Numbers
/// and nested structures count as not found.
pub fn string_value<'a>(map: &'a HashMap<String, Value>, key: &str) -> Option<&'a str> {
    match map.get(key) {
        Some(Value::String(value)) => Some(value.as_str()),
        _ => None,
    }
}

/// Rendered form of a label value in message text: strings verbatim,
/// everything else as compact json.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(value) => value.clone(),
        other => other.to_string(),
    }
}
