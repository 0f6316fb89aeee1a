//! Key and destination naming
//!
//! [`KeyNamingStrategy`] derives the five identifiers a write needs. Each
//! function can be replaced independently; `None` restores its default.
//!
//! ## Defaults
//!
//! | Identifier | Format |
//! |------------|--------|
//! | partition key | `%Y%m%d%H` of the record timestamp (UTC) |
//! | row key | 19-digit inverted nanos, `_`, record id |
//! | table | `Logger` + `YYYYMM` + `Low`/`High` |
//! | blob container | `azlogs-` + `YYYYMM` |
//! | blob | `severity/partitionKey/rowKey.json` |
//!
//! Inverted nanos (`i64::MAX - nanos`) sort newer records first within a
//! partition.
//!
//! The `validate_*` functions run before any backend call and return the
//! rejection reason on error.

use duallog_core::RawLogRecord;
use std::fmt;
use std::sync::Arc;

/// Partition key function
pub type PartitionKeyFn = Arc<dyn Fn(&RawLogRecord) -> String + Send + Sync>;

/// Row key function, given the partition key
pub type RowKeyFn = Arc<dyn Fn(&RawLogRecord, &str) -> String + Send + Sync>;

/// Destination name function, given the partition and row keys
pub type NameFn = Arc<dyn Fn(&RawLogRecord, &str, &str) -> String + Send + Sync>;

/// Longest accepted key or blob name
pub const MAX_KEY_LEN: usize = 1024;

/// Partition and row key of one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedKeys {
    /// Partition key
    pub partition_key: String,
    /// Row key
    pub row_key: String,
}

/// Overridable naming functions
#[derive(Clone, Default)]
pub struct KeyNamingStrategy {
    partition_key: Option<PartitionKeyFn>,
    row_key: Option<RowKeyFn>,
    table_name: Option<NameFn>,
    blob_container_name: Option<NameFn>,
    blob_name: Option<NameFn>,
}

impl KeyNamingStrategy {
    /// Strategy using every default
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the partition key function
    pub fn with_partition_key(mut self, f: Option<PartitionKeyFn>) -> Self {
        self.partition_key = f;
        self
    }

    /// Replace the row key function
    pub fn with_row_key(mut self, f: Option<RowKeyFn>) -> Self {
        self.row_key = f;
        self
    }

    /// Replace the table name function
    pub fn with_table_name(mut self, f: Option<NameFn>) -> Self {
        self.table_name = f;
        self
    }

    /// Replace the blob container name function
    pub fn with_blob_container_name(mut self, f: Option<NameFn>) -> Self {
        self.blob_container_name = f;
        self
    }

    /// Replace the blob name function
    pub fn with_blob_name(mut self, f: Option<NameFn>) -> Self {
        self.blob_name = f;
        self
    }

    /// Partition key of `record`
    pub fn partition_key(&self, record: &RawLogRecord) -> String {
        match &self.partition_key {
            Some(f) => f(record),
            None => default_partition_key(record),
        }
    }

    /// Row key of `record`
    pub fn row_key(&self, record: &RawLogRecord, partition_key: &str) -> String {
        match &self.row_key {
            Some(f) => f(record, partition_key),
            None => default_row_key(record, partition_key),
        }
    }

    /// Both keys, row key derived from the partition key
    pub fn keys(&self, record: &RawLogRecord) -> DerivedKeys {
        let partition_key = self.partition_key(record);
        let row_key = self.row_key(record, &partition_key);
        DerivedKeys {
            partition_key,
            row_key,
        }
    }

    /// Table for `record`
    pub fn table_name(&self, record: &RawLogRecord, keys: &DerivedKeys) -> String {
        Self::apply(&self.table_name, default_table_name, record, keys)
    }

    /// Blob container for `record`
    pub fn blob_container_name(&self, record: &RawLogRecord, keys: &DerivedKeys) -> String {
        Self::apply(
            &self.blob_container_name,
            default_blob_container_name,
            record,
            keys,
        )
    }

    /// Blob name for `record`
    pub fn blob_name(&self, record: &RawLogRecord, keys: &DerivedKeys) -> String {
        Self::apply(&self.blob_name, default_blob_name, record, keys)
    }

    fn apply(
        custom: &Option<NameFn>,
        default: fn(&RawLogRecord, &str, &str) -> String,
        record: &RawLogRecord,
        keys: &DerivedKeys,
    ) -> String {
        match custom {
            Some(f) => f(record, &keys.partition_key, &keys.row_key),
            None => default(record, &keys.partition_key, &keys.row_key),
        }
    }
}

impl fmt::Debug for KeyNamingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyNamingStrategy")
            .field("custom_partition_key", &self.partition_key.is_some())
            .field("custom_row_key", &self.row_key.is_some())
            .field("custom_table_name", &self.table_name.is_some())
            .field("custom_blob_container_name", &self.blob_container_name.is_some())
            .field("custom_blob_name", &self.blob_name.is_some())
            .finish()
    }
}

// ============================================================================
// Defaults
// ============================================================================

/// `%Y%m%d%H` of the record timestamp
pub fn default_partition_key(record: &RawLogRecord) -> String {
    record.timestamp.format("%Y%m%d%H").to_string()
}

/// Inverted timestamp nanos, zero-padded to 19 digits, then the record id
pub fn default_row_key(record: &RawLogRecord, _partition_key: &str) -> String {
    let nanos = record.timestamp.timestamp_nanos_opt().unwrap_or(0);
    let inverted = i64::MAX.saturating_sub(nanos.max(0));
    format!("{:019}_{}", inverted, record.id.simple())
}

/// `Logger` + year/month + storage tier
pub fn default_table_name(record: &RawLogRecord, _pk: &str, _rk: &str) -> String {
    format!(
        "Logger{}{}",
        record.timestamp.format("%Y%m"),
        record.severity_level.tier().suffix()
    )
}

/// `azlogs-` + year/month
pub fn default_blob_container_name(record: &RawLogRecord, _pk: &str, _rk: &str) -> String {
    format!("azlogs-{}", record.timestamp.format("%Y%m"))
}

/// `severity/partitionKey/rowKey.json`
pub fn default_blob_name(record: &RawLogRecord, partition_key: &str, row_key: &str) -> String {
    format!("{}/{}/{}.json", record.severity_level, partition_key, row_key)
}

// ============================================================================
// Validation
// ============================================================================

/// Letters and digits only, leading letter, 3 to 63 characters
pub fn validate_table_name(name: &str) -> Result<(), String> {
    let len = name.chars().count();
    if !(3..=63).contains(&len) {
        return Err(format!("table name '{}' must be 3 to 63 characters", name));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(format!("table name '{}' must be letters and digits only", name));
    }
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err(format!("table name '{}' must start with a letter", name));
    }
    Ok(())
}

/// Lowercase letters, digits and single hyphens, 3 to 63 characters
pub fn validate_container_name(name: &str) -> Result<(), String> {
    let len = name.chars().count();
    if !(3..=63).contains(&len) {
        return Err(format!("container name '{}' must be 3 to 63 characters", name));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(format!(
            "container name '{}' must be lowercase letters, digits or hyphens",
            name
        ));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(format!(
            "container name '{}' must start and end with a letter or digit",
            name
        ));
    }
    if name.contains("--") {
        return Err(format!(
            "container name '{}' must not contain consecutive hyphens",
            name
        ));
    }
    Ok(())
}

/// Non-empty, bounded, free of `/ \ # ?` and control characters
pub fn validate_key(kind: &str, key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err(format!("{} must not be empty", kind));
    }
    if key.chars().count() > MAX_KEY_LEN {
        return Err(format!("{} exceeds {} characters", kind, MAX_KEY_LEN));
    }
    if let Some(bad) = key
        .chars()
        .find(|c| matches!(c, '/' | '\\' | '#' | '?') || c.is_control())
    {
        return Err(format!("{} '{}' contains forbidden character {:?}", kind, key, bad));
    }
    Ok(())
}

/// Non-empty and bounded
pub fn validate_blob_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("blob name must not be empty".to_string());
    }
    if name.chars().count() > MAX_KEY_LEN {
        return Err(format!("blob name exceeds {} characters", MAX_KEY_LEN));
    }
    Ok(())
}
