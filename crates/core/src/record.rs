//! Log records as submitted and as stored
//!
//! A [`RawLogRecord`] is what callers build. The engine derives keys for it
//! and turns it into a [`LogRecord`], the stored form: exception and call-site
//! details are flattened, the verbose map is serialized to an opaque JSON
//! string, and ten verbose labels are filled from that map.

use crate::entity::TableEntity;
use crate::error::{Error, Result};
use crate::severity::SeverityLevel;
use crate::LABEL_COUNT;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Fills the ten verbose labels of a stored record from its verbose map
pub type VerboseLabelFill =
    Arc<dyn Fn(&BTreeMap<String, String>) -> [Option<String>; LABEL_COUNT] + Send + Sync>;

/// Separator between flattened exception messages and stack traces
const FLATTEN_SEPARATOR: &str = "\n";

/// A single stack frame
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StackFrame {
    /// Method or function name
    pub method: Option<String>,
    /// Line number
    pub line: Option<u32>,
    /// Column number
    pub column: Option<u32>,
}

/// Where the log call was made from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallSite {
    /// Rendered call stack
    pub stack: Option<String>,
    /// Innermost frame
    pub frame: Option<StackFrame>,
}

/// Captured exception chain
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExceptionInfo {
    /// Type name of the outermost exception
    pub type_name: String,
    /// Messages, outermost first
    pub messages: Vec<String>,
    /// Stack traces, outermost first
    pub stack_traces: Vec<String>,
    /// Top frame of the outermost exception
    pub top_frame: Option<StackFrame>,
}

/// A log record as submitted by a caller
#[derive(Debug, Clone, PartialEq)]
pub struct RawLogRecord {
    /// Unique id, used by default row-key derivation
    pub id: Uuid,
    /// Creation time, used by default key and name derivation
    pub timestamp: DateTime<Utc>,
    /// Emitting component (required)
    pub source: String,
    /// Severity (required)
    pub severity_level: SeverityLevel,
    /// Human-readable message
    pub message: Option<String>,
    /// Free-form category
    pub category: Option<String>,
    /// Free-form verbose key/value details
    pub verbose: BTreeMap<String, String>,
    /// Associated exception
    pub exception: Option<ExceptionInfo>,
    /// Call site
    pub call_site: Option<CallSite>,
    /// Generic labels
    pub labels: [Option<String>; LABEL_COUNT],
}

impl RawLogRecord {
    /// Create a record stamped with a fresh id and the current time
    pub fn new(source: impl Into<String>, severity_level: SeverityLevel) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            severity_level,
            message: None,
            category: None,
            verbose: BTreeMap::new(),
            exception: None,
            call_site: None,
            labels: Default::default(),
        }
    }

    /// Override the id
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Override the timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set the message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Set the category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Add a verbose entry
    pub fn with_verbose(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.verbose.insert(key.into(), value.into());
        self
    }

    /// Attach an exception
    pub fn with_exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }

    /// Attach a call site
    pub fn with_call_site(mut self, call_site: CallSite) -> Self {
        self.call_site = Some(call_site);
        self
    }

    /// Set label `index`; indices outside `0..LABEL_COUNT` are ignored
    pub fn with_label(mut self, index: usize, value: impl Into<String>) -> Self {
        if let Some(slot) = self.labels.get_mut(index) {
            *slot = Some(value.into());
        }
        self
    }

    /// Check the required fields
    pub fn validate(&self) -> Result<()> {
        crate::error::require_non_empty(&self.source, "source")
    }
}

/// Default verbose label fill: the first ten verbose entries in key order,
/// rendered as `key=value`.
pub fn default_verbose_labels(verbose: &BTreeMap<String, String>) -> [Option<String>; LABEL_COUNT] {
    let mut labels: [Option<String>; LABEL_COUNT] = Default::default();
    for (slot, (key, value)) in labels.iter_mut().zip(verbose.iter()) {
        *slot = Some(format!("{}={}", key, value));
    }
    labels
}

/// A log record in its stored form
///
/// Partition and row keys are fixed at creation and only readable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    partition_key: String,
    row_key: String,
    /// Creation time of the original record
    pub timestamp: Option<DateTime<Utc>>,
    /// Emitting component
    pub source: String,
    /// Severity
    pub severity_level: SeverityLevel,
    /// Message
    pub message: Option<String>,
    /// Category
    pub category: Option<String>,
    /// Rendered call stack
    pub call_stack: Option<String>,
    /// Call-site method
    pub call_stack_method: Option<String>,
    /// Call-site line
    pub call_stack_line: Option<u32>,
    /// Call-site column
    pub call_stack_column: Option<u32>,
    /// Verbose map as an opaque JSON string
    pub verbose_json: Option<String>,
    /// Exception type name
    pub exception_type: Option<String>,
    /// All exception messages, newline separated
    pub exception_messages: Option<String>,
    /// All exception stack traces, newline separated
    pub exception_stack_traces: Option<String>,
    /// Top-frame method of the exception
    pub exception_stack_method: Option<String>,
    /// Top-frame line of the exception
    pub exception_stack_line: Option<u32>,
    /// Top-frame column of the exception
    pub exception_stack_column: Option<u32>,
    /// Generic labels
    pub labels: [Option<String>; LABEL_COUNT],
    /// Labels derived from the verbose map
    pub verbose_labels: [Option<String>; LABEL_COUNT],
}

// Persisted property names
const SOURCE: &str = "source";
const SEVERITY_LEVEL: &str = "severityLevel";
const TIMESTAMP: &str = "timestamp";
const MESSAGE: &str = "message";
const CATEGORY: &str = "category";
const CALL_STACK: &str = "callStack";
const CALL_STACK_METHOD: &str = "callStackMethod";
const CALL_STACK_LINE: &str = "callStackLine";
const CALL_STACK_COLUMN: &str = "callStackColumn";
const VERBOSE_JSON: &str = "verboseJson";
const EXCEPTION_TYPE: &str = "exceptionType";
const EXCEPTION_MESSAGES: &str = "exceptionMessages";
const EXCEPTION_STACK_TRACES: &str = "exceptionStackTraces";
const EXCEPTION_STACK_METHOD: &str = "exceptionStackMethod";
const EXCEPTION_STACK_LINE: &str = "exceptionStackLine";
const EXCEPTION_STACK_COLUMN: &str = "exceptionStackColumn";

impl LogRecord {
    /// Build the stored form of `raw` under the given keys
    ///
    /// `fill` derives the verbose labels; `None` uses
    /// [`default_verbose_labels`].
    pub fn from_raw(
        raw: &RawLogRecord,
        partition_key: impl Into<String>,
        row_key: impl Into<String>,
        fill: Option<&VerboseLabelFill>,
    ) -> Result<Self> {
        raw.validate()?;
        let partition_key = partition_key.into();
        let row_key = row_key.into();
        crate::error::require_non_empty(&partition_key, "partition_key")?;
        crate::error::require_non_empty(&row_key, "row_key")?;

        let verbose_json = if raw.verbose.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&raw.verbose)?)
        };
        let verbose_labels = match fill {
            Some(f) => f(&raw.verbose),
            None => default_verbose_labels(&raw.verbose),
        };

        let call_frame = raw.call_site.as_ref().and_then(|c| c.frame.as_ref());
        let exception_frame = raw.exception.as_ref().and_then(|e| e.top_frame.as_ref());

        Ok(Self {
            partition_key,
            row_key,
            timestamp: Some(raw.timestamp),
            source: raw.source.clone(),
            severity_level: raw.severity_level,
            message: raw.message.clone(),
            category: raw.category.clone(),
            call_stack: raw.call_site.as_ref().and_then(|c| c.stack.clone()),
            call_stack_method: call_frame.and_then(|f| f.method.clone()),
            call_stack_line: call_frame.and_then(|f| f.line),
            call_stack_column: call_frame.and_then(|f| f.column),
            verbose_json,
            exception_type: raw.exception.as_ref().map(|e| e.type_name.clone()),
            exception_messages: raw
                .exception
                .as_ref()
                .map(|e| e.messages.join(FLATTEN_SEPARATOR)),
            exception_stack_traces: raw
                .exception
                .as_ref()
                .map(|e| e.stack_traces.join(FLATTEN_SEPARATOR)),
            exception_stack_method: exception_frame.and_then(|f| f.method.clone()),
            exception_stack_line: exception_frame.and_then(|f| f.line),
            exception_stack_column: exception_frame.and_then(|f| f.column),
            labels: raw.labels.clone(),
            verbose_labels,
        })
    }

    /// Partition key
    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    /// Row key
    pub fn row_key(&self) -> &str {
        &self.row_key
    }

    /// Decode the verbose map, if any
    pub fn verbose(&self) -> Result<BTreeMap<String, String>> {
        match &self.verbose_json {
            Some(json) => Ok(serde_json::from_str(json)?),
            None => Ok(BTreeMap::new()),
        }
    }

    /// Flatten into the persisted entity layout
    pub fn to_entity(&self) -> TableEntity {
        let mut entity = TableEntity::new(self.partition_key.clone(), self.row_key.clone());
        entity.set_str(SOURCE, Some(&self.source));
        entity.set_str(SEVERITY_LEVEL, Some(self.severity_level.as_str()));
        let timestamp = self
            .timestamp
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Nanos, true));
        entity.set_str(TIMESTAMP, timestamp.as_deref());
        entity.set_str(MESSAGE, self.message.as_deref());
        entity.set_str(CATEGORY, self.category.as_deref());
        entity.set_str(CALL_STACK, self.call_stack.as_deref());
        entity.set_str(CALL_STACK_METHOD, self.call_stack_method.as_deref());
        entity.set_u32(CALL_STACK_LINE, self.call_stack_line);
        entity.set_u32(CALL_STACK_COLUMN, self.call_stack_column);
        entity.set_str(VERBOSE_JSON, self.verbose_json.as_deref());
        entity.set_str(EXCEPTION_TYPE, self.exception_type.as_deref());
        entity.set_str(EXCEPTION_MESSAGES, self.exception_messages.as_deref());
        entity.set_str(EXCEPTION_STACK_TRACES, self.exception_stack_traces.as_deref());
        entity.set_str(EXCEPTION_STACK_METHOD, self.exception_stack_method.as_deref());
        entity.set_u32(EXCEPTION_STACK_LINE, self.exception_stack_line);
        entity.set_u32(EXCEPTION_STACK_COLUMN, self.exception_stack_column);
        for (i, label) in self.labels.iter().enumerate() {
            entity.set_str(&format!("label{}", i), label.as_deref());
        }
        for (i, label) in self.verbose_labels.iter().enumerate() {
            entity.set_str(&format!("verboseLabel{}", i), label.as_deref());
        }
        entity
    }

    /// Rebuild a record from its persisted entity
    pub fn from_entity(entity: &TableEntity) -> Result<Self> {
        let owned = |name: &str| entity.get_str(name).map(str::to_string);

        let source = owned(SOURCE).ok_or(Error::MissingArgument("source"))?;
        let severity_level = entity
            .get_str(SEVERITY_LEVEL)
            .ok_or(Error::MissingArgument("severity_level"))?
            .parse::<SeverityLevel>()?;
        let timestamp = match entity.get_str(TIMESTAMP) {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(raw)
                    .map_err(|e| Error::Serialization(format!("timestamp: {}", e)))?
                    .with_timezone(&Utc),
            ),
            None => None,
        };

        let mut labels: [Option<String>; LABEL_COUNT] = Default::default();
        let mut verbose_labels: [Option<String>; LABEL_COUNT] = Default::default();
        for i in 0..LABEL_COUNT {
            labels[i] = owned(&format!("label{}", i));
            verbose_labels[i] = owned(&format!("verboseLabel{}", i));
        }

        Ok(Self {
            partition_key: entity.partition_key.clone(),
            row_key: entity.row_key.clone(),
            timestamp,
            source,
            severity_level,
            message: owned(MESSAGE),
            category: owned(CATEGORY),
            call_stack: owned(CALL_STACK),
            call_stack_method: owned(CALL_STACK_METHOD),
            call_stack_line: entity.get_u32(CALL_STACK_LINE),
            call_stack_column: entity.get_u32(CALL_STACK_COLUMN),
            verbose_json: owned(VERBOSE_JSON),
            exception_type: owned(EXCEPTION_TYPE),
            exception_messages: owned(EXCEPTION_MESSAGES),
            exception_stack_traces: owned(EXCEPTION_STACK_TRACES),
            exception_stack_method: owned(EXCEPTION_STACK_METHOD),
            exception_stack_line: entity.get_u32(EXCEPTION_STACK_LINE),
            exception_stack_column: entity.get_u32(EXCEPTION_STACK_COLUMN),
            labels,
            verbose_labels,
        })
    }

    /// Encode as a blob payload (JSON of the entity layout)
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.to_entity())?)
    }

    /// Decode a blob payload
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let entity: TableEntity = serde_json::from_slice(bytes)?;
        Self::from_entity(&entity)
    }
}
