use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Result,
    model::ProcessId,
    store::data::{MessageType, Status},
};

/// Surrogate key of one execution attempt of a process.
pub type RegisterId = u64;

/// One execution attempt of a process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRegister {
    pub id: RegisterId,
    pub process_id: ProcessId,
    pub status: Status,
    pub start_timestamp: DateTime<Utc>,
    pub data_timestamp: Option<DateTime<Utc>>,
    pub last_process_timestamp: DateTime<Utc>,
    /// JSON object mapping a tag to the list of values added with `add_value`.
    pub data: Option<String>,
}

impl ProcessRegister {
    /// Decoded `data` blob.
    pub fn values(&self) -> Result<BTreeMap<String, Vec<String>>> {
        match self.data.as_deref() {
            None | Some("") => Ok(BTreeMap::new()),
            Some(data) => Ok(serde_json::from_str(data)?),
        }
    }
}

/// Message attached to a process register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRegister {
    pub id: u64,
    pub log_id: RegisterId,
    pub message_type: MessageType,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// A process register together with its messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessLog {
    pub register: ProcessRegister,
    pub messages: Vec<MessageRegister>,
}

/// Appends `value` to the array stored under `tag` in a `data` blob.
pub(crate) fn merge_value(
    data: Option<&str>,
    tag: &str,
    value: &str,
) -> Result<String> {
    let mut object = match data {
        None | Some("") => serde_json::Map::new(),
        Some(data) => match serde_json::from_str::<serde_json::Value>(data)? {
            serde_json::Value::Object(object) => object,
            _ => serde_json::Map::new(),
        },
    };

    let entry = object.entry(tag.to_string()).or_insert_with(|| serde_json::Value::Array(Vec::new()));
    if !entry.is_array() {
        *entry = serde_json::Value::Array(Vec::new());
    }
    if let serde_json::Value::Array(values) = entry {
        values.push(serde_json::Value::String(value.to_string()));
    }

    Ok(serde_json::Value::Object(object).to_string())
}

#[cfg(test)]
mod test {
    use super::merge_value;

    #[test]
    fn test_merge_value() {
        let data = merge_value(None, "files", "a.tif").unwrap();
        let data = merge_value(Some(&data), "files", "b.tif").unwrap();
        let data = merge_value(Some(&data), "count", "2").unwrap();

        let value: serde_json::Value = serde_json::from_str(&data).unwrap();
        assert_eq!(value["files"], serde_json::json!(["a.tif", "b.tif"]));
        assert_eq!(value["count"], serde_json::json!(["2"]));
    }

    #[test]
    fn test_merge_value_replaces_non_array_tag() {
        let data = merge_value(Some(r#"{"files": "broken"}"#), "files", "a.tif").unwrap();
        let value: serde_json::Value = serde_json::from_str(&data).unwrap();
        assert_eq!(value["files"], serde_json::json!(["a.tif"]));
    }
}
