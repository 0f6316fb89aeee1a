//! Flattened entity persisted by keyed-record stores
//!
//! A [`TableEntity`] is the logical shape of a stored record: two required
//! keys plus a property bag. Blob stores persist the JSON encoding of the
//! same entity, so both backends share one logical layout:
//!
//! ```json
//! {"partitionKey": "2024011509", "rowKey": "...", "source": "api", "severityLevel": "Error"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Keyed property bag as stored in a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableEntity {
    /// Partition key
    pub partition_key: String,
    /// Row key, unique within the partition
    pub row_key: String,
    /// All other properties, absent ones omitted
    #[serde(flatten)]
    pub properties: BTreeMap<String, Value>,
}

impl TableEntity {
    /// Create an entity with no properties
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Set a string property, skipping `None`
    pub fn set_str(&mut self, name: &str, value: Option<&str>) {
        if let Some(v) = value {
            self.properties
                .insert(name.to_string(), Value::String(v.to_string()));
        }
    }

    /// Set an integer property, skipping `None`
    pub fn set_u32(&mut self, name: &str, value: Option<u32>) {
        if let Some(v) = value {
            self.properties.insert(name.to_string(), Value::from(v));
        }
    }

    /// Get a string property
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Value::as_str)
    }

    /// Get an integer property
    ///
    /// Returns `None` when absent or not representable as `u32`.
    pub fn get_u32(&self, name: &str) -> Option<u32> {
        self.properties
            .get(name)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
    }

    /// Number of non-key properties
    pub fn property_count(&self) -> usize {
        self.properties.len()
    }
}
