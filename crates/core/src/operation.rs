//! Store operations and the container that holds them in a sequence
//!
//! ## Operation kinds
//!
//! | Kind | Category | Input |
//! |------|----------|-------|
//! | [`AddToTableOperation`] | `AddToTable` | raw record, optional table override |
//! | [`AddToBlobOperation`] | `AddToBlob` | raw record, optional container/blob override |
//! | [`GetFromTableOperation`] | `GetFromTable` | table name, partition key, row key |
//! | [`GetFromBlobOperation`] | `GetFromBlob` | container name, blob name |
//!
//! Every operation carries [`OperationOptions`] and a [`ResponseSlot`]. The
//! slot starts empty and is filled exactly once when the operation executes;
//! a skipped or cancelled operation keeps an empty slot.

use crate::error::{require_non_empty, Error, Result};
use crate::record::RawLogRecord;
use crate::response::{StoreResponse, StoreStatus};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Decides whether the step after this one runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SequenceExecutionType {
    /// Never run the next step
    NextNever,
    /// Always run the next step
    #[default]
    NextAlways,
    /// Run the next step only if this one failed
    NextOnFails,
    /// Run the next step only if this one completed (Success or Warning)
    NextOnComplete,
}

impl SequenceExecutionType {
    /// Whether the next step should execute given this step's status
    ///
    /// `None` stands for a step that did not execute. Only `NextAlways`
    /// lets execution resume after a skipped step.
    pub fn next_should_execute(&self, status: Option<StoreStatus>) -> bool {
        match self {
            SequenceExecutionType::NextNever => false,
            SequenceExecutionType::NextAlways => true,
            SequenceExecutionType::NextOnFails => status == Some(StoreStatus::Failure),
            SequenceExecutionType::NextOnComplete => matches!(
                status,
                Some(StoreStatus::Success) | Some(StoreStatus::Warning)
            ),
        }
    }
}

/// Per-operation execution options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOptions {
    /// Continuation rule for the following step
    pub execution_type: SequenceExecutionType,
    /// Retry transient failures
    pub retry_on_failures: bool,
    /// Attempt limit; `None` uses the engine's retry policy
    pub max_attempts: Option<u32>,
    /// Create the table or container if it does not exist
    pub create_if_absent: bool,
}

impl OperationOptions {
    /// Defaults for add operations (create destination if absent)
    pub fn for_write() -> Self {
        Self {
            execution_type: SequenceExecutionType::NextAlways,
            retry_on_failures: true,
            max_attempts: None,
            create_if_absent: true,
        }
    }

    /// Defaults for get operations (do not create destination)
    pub fn for_read() -> Self {
        Self {
            create_if_absent: false,
            ..Self::for_write()
        }
    }

    /// Set the continuation rule
    pub fn next(mut self, execution_type: SequenceExecutionType) -> Self {
        self.execution_type = execution_type;
        self
    }

    /// Enable or disable retries
    pub fn retry(mut self, retry_on_failures: bool) -> Self {
        self.retry_on_failures = retry_on_failures;
        self
    }

    /// Set the attempt limit
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Set whether the destination is created when missing
    pub fn create_if_absent(mut self, create_if_absent: bool) -> Self {
        self.create_if_absent = create_if_absent;
        self
    }

    /// Reject a zero attempt limit while retries are enabled
    pub fn validate(&self) -> Result<()> {
        if self.retry_on_failures && self.max_attempts == Some(0) {
            return Err(Error::InvalidMaxAttempts);
        }
        Ok(())
    }
}

/// Single-assignment response holder
#[derive(Debug, Default)]
pub struct ResponseSlot(OnceCell<StoreResponse>);

impl ResponseSlot {
    /// Empty slot
    pub fn new() -> Self {
        Self(OnceCell::new())
    }

    /// Response, if the operation executed
    pub fn get(&self) -> Option<&StoreResponse> {
        self.0.get()
    }

    /// Assign the response; a second assignment is a contract violation
    pub fn set(&self, response: StoreResponse, kind: &'static str) -> Result<()> {
        self.0
            .set(response)
            .map_err(|_| Error::ResponseAlreadySet(kind))
    }

    /// Check if a response has been assigned
    pub fn is_set(&self) -> bool {
        self.0.get().is_some()
    }
}

/// Category tag of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationCategory {
    /// Write a record to the keyed store
    AddToTable,
    /// Write a record to the blob store
    AddToBlob,
    /// Read a record from the keyed store
    GetFromTable,
    /// Read a record from the blob store
    GetFromBlob,
}

impl OperationCategory {
    /// Stable name for diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationCategory::AddToTable => "AddToTable",
            OperationCategory::AddToBlob => "AddToBlob",
            OperationCategory::GetFromTable => "GetFromTable",
            OperationCategory::GetFromBlob => "GetFromBlob",
        }
    }
}

impl std::fmt::Display for OperationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ============================================================================
// Operation kinds
// ============================================================================

/// Write a record to the keyed store
#[derive(Debug)]
pub struct AddToTableOperation {
    record: RawLogRecord,
    table_name: Option<String>,
    options: OperationOptions,
    response: ResponseSlot,
}

impl AddToTableOperation {
    /// Create the operation; fails on an empty source or a zero attempt limit
    pub fn new(record: RawLogRecord, options: OperationOptions) -> Result<Self> {
        record.validate()?;
        options.validate()?;
        Ok(Self {
            record,
            table_name: None,
            options,
            response: ResponseSlot::new(),
        })
    }

    /// Write to `table_name` instead of the derived name; empty reverts to the default
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = non_empty(Some(table_name.into()));
        self
    }

    /// Record to write
    pub fn record(&self) -> &RawLogRecord {
        &self.record
    }

    /// Table name override
    pub fn table_name(&self) -> Option<&str> {
        self.table_name.as_deref()
    }
}

/// Write a record to the blob store
#[derive(Debug)]
pub struct AddToBlobOperation {
    record: RawLogRecord,
    container_name: Option<String>,
    blob_name: Option<String>,
    options: OperationOptions,
    response: ResponseSlot,
}

impl AddToBlobOperation {
    /// Create the operation; fails on an empty source or a zero attempt limit
    pub fn new(record: RawLogRecord, options: OperationOptions) -> Result<Self> {
        record.validate()?;
        options.validate()?;
        Ok(Self {
            record,
            container_name: None,
            blob_name: None,
            options,
            response: ResponseSlot::new(),
        })
    }

    /// Write into `container_name` instead of the derived name
    pub fn with_container_name(mut self, container_name: impl Into<String>) -> Self {
        self.container_name = non_empty(Some(container_name.into()));
        self
    }

    /// Write as `blob_name` instead of the derived name
    pub fn with_blob_name(mut self, blob_name: impl Into<String>) -> Self {
        self.blob_name = non_empty(Some(blob_name.into()));
        self
    }

    /// Record to write
    pub fn record(&self) -> &RawLogRecord {
        &self.record
    }

    /// Container name override
    pub fn container_name(&self) -> Option<&str> {
        self.container_name.as_deref()
    }

    /// Blob name override
    pub fn blob_name(&self) -> Option<&str> {
        self.blob_name.as_deref()
    }
}

/// Read a record from the keyed store
#[derive(Debug)]
pub struct GetFromTableOperation {
    table_name: String,
    partition_key: String,
    row_key: String,
    options: OperationOptions,
    response: ResponseSlot,
}

impl GetFromTableOperation {
    /// Create the operation; all three identifiers are required
    pub fn new(
        table_name: impl Into<String>,
        partition_key: impl Into<String>,
        row_key: impl Into<String>,
        options: OperationOptions,
    ) -> Result<Self> {
        let table_name = table_name.into();
        let partition_key = partition_key.into();
        let row_key = row_key.into();
        require_non_empty(&table_name, "table_name")?;
        require_non_empty(&partition_key, "partition_key")?;
        require_non_empty(&row_key, "row_key")?;
        options.validate()?;
        Ok(Self {
            table_name,
            partition_key,
            row_key,
            options,
            response: ResponseSlot::new(),
        })
    }

    /// Table to read from
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Partition key
    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    /// Row key
    pub fn row_key(&self) -> &str {
        &self.row_key
    }
}

/// Read a record from the blob store
#[derive(Debug)]
pub struct GetFromBlobOperation {
    container_name: String,
    blob_name: String,
    options: OperationOptions,
    response: ResponseSlot,
}

impl GetFromBlobOperation {
    /// Create the operation; both identifiers are required
    pub fn new(
        container_name: impl Into<String>,
        blob_name: impl Into<String>,
        options: OperationOptions,
    ) -> Result<Self> {
        let container_name = container_name.into();
        let blob_name = blob_name.into();
        require_non_empty(&container_name, "container_name")?;
        require_non_empty(&blob_name, "blob_name")?;
        options.validate()?;
        Ok(Self {
            container_name,
            blob_name,
            options,
            response: ResponseSlot::new(),
        })
    }

    /// Container to read from
    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    /// Blob to read
    pub fn blob_name(&self) -> &str {
        &self.blob_name
    }
}

// ============================================================================
// Container
// ============================================================================

/// One operation of any kind, as held by a sequence
///
/// Each variant holds a shared handle, so the caller, the global order and
/// the per-category view all observe the same response.
#[derive(Debug, Clone)]
pub enum OperationContainer {
    /// Keyed-store write
    AddToTable(Arc<AddToTableOperation>),
    /// Blob-store write
    AddToBlob(Arc<AddToBlobOperation>),
    /// Keyed-store read
    GetFromTable(Arc<GetFromTableOperation>),
    /// Blob-store read
    GetFromBlob(Arc<GetFromBlobOperation>),
}

/// Returned when a container holds a different operation kind than requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryMismatch {
    /// Kind that was requested
    pub expected: OperationCategory,
    /// Kind actually held
    pub actual: OperationCategory,
}

impl std::fmt::Display for CategoryMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "expected {} operation, found {}", self.expected, self.actual)
    }
}

impl std::error::Error for CategoryMismatch {}

/// Implemented by the four operation kinds
pub trait ContainedOperation: Sized {
    /// Category tag of this kind
    const CATEGORY: OperationCategory;

    /// Wrap a shared handle in a container
    fn into_container(op: Arc<Self>) -> OperationContainer;

    /// Borrow the handle if `container` holds this kind
    fn from_container(container: &OperationContainer) -> Option<&Arc<Self>>;

    /// Execution options
    fn options(&self) -> &OperationOptions;

    /// Response slot
    fn slot(&self) -> &ResponseSlot;

    /// Response, if executed
    fn response(&self) -> Option<&StoreResponse> {
        self.slot().get()
    }

    /// Assign the response once
    fn set_response(&self, response: StoreResponse) -> Result<()> {
        self.slot().set(response, Self::CATEGORY.as_str())
    }
}

impl ContainedOperation for AddToTableOperation {
    const CATEGORY: OperationCategory = OperationCategory::AddToTable;

    fn into_container(op: Arc<Self>) -> OperationContainer {
        OperationContainer::AddToTable(op)
    }

    fn from_container(container: &OperationContainer) -> Option<&Arc<Self>> {
        match container {
            OperationContainer::AddToTable(op) => Some(op),
            _ => None,
        }
    }

    fn options(&self) -> &OperationOptions {
        &self.options
    }

    fn slot(&self) -> &ResponseSlot {
        &self.response
    }
}

impl ContainedOperation for AddToBlobOperation {
    const CATEGORY: OperationCategory = OperationCategory::AddToBlob;

    fn into_container(op: Arc<Self>) -> OperationContainer {
        OperationContainer::AddToBlob(op)
    }

    fn from_container(container: &OperationContainer) -> Option<&Arc<Self>> {
        match container {
            OperationContainer::AddToBlob(op) => Some(op),
            _ => None,
        }
    }

    fn options(&self) -> &OperationOptions {
        &self.options
    }

    fn slot(&self) -> &ResponseSlot {
        &self.response
    }
}

impl ContainedOperation for GetFromTableOperation {
    const CATEGORY: OperationCategory = OperationCategory::GetFromTable;

    fn into_container(op: Arc<Self>) -> OperationContainer {
        OperationContainer::GetFromTable(op)
    }

    fn from_container(container: &OperationContainer) -> Option<&Arc<Self>> {
        match container {
            OperationContainer::GetFromTable(op) => Some(op),
            _ => None,
        }
    }

    fn options(&self) -> &OperationOptions {
        &self.options
    }

    fn slot(&self) -> &ResponseSlot {
        &self.response
    }
}

impl ContainedOperation for GetFromBlobOperation {
    const CATEGORY: OperationCategory = OperationCategory::GetFromBlob;

    fn into_container(op: Arc<Self>) -> OperationContainer {
        OperationContainer::GetFromBlob(op)
    }

    fn from_container(container: &OperationContainer) -> Option<&Arc<Self>> {
        match container {
            OperationContainer::GetFromBlob(op) => Some(op),
            _ => None,
        }
    }

    fn options(&self) -> &OperationOptions {
        &self.options
    }

    fn slot(&self) -> &ResponseSlot {
        &self.response
    }
}

impl OperationContainer {
    /// Wrap an operation
    pub fn new<T: ContainedOperation>(op: T) -> Self {
        T::into_container(Arc::new(op))
    }

    /// Category tag
    pub fn category(&self) -> OperationCategory {
        match self {
            OperationContainer::AddToTable(_) => OperationCategory::AddToTable,
            OperationContainer::AddToBlob(_) => OperationCategory::AddToBlob,
            OperationContainer::GetFromTable(_) => OperationCategory::GetFromTable,
            OperationContainer::GetFromBlob(_) => OperationCategory::GetFromBlob,
        }
    }

    /// Borrow the operation as kind `T`
    pub fn extract<T: ContainedOperation>(&self) -> std::result::Result<&Arc<T>, CategoryMismatch> {
        T::from_container(self).ok_or(CategoryMismatch {
            expected: T::CATEGORY,
            actual: self.category(),
        })
    }

    /// Execution options of the held operation
    pub fn options(&self) -> &OperationOptions {
        match self {
            OperationContainer::AddToTable(op) => op.options(),
            OperationContainer::AddToBlob(op) => op.options(),
            OperationContainer::GetFromTable(op) => op.options(),
            OperationContainer::GetFromBlob(op) => op.options(),
        }
    }

    /// Response of the held operation, if executed
    pub fn response(&self) -> Option<&StoreResponse> {
        match self {
            OperationContainer::AddToTable(op) => op.response(),
            OperationContainer::AddToBlob(op) => op.response(),
            OperationContainer::GetFromTable(op) => op.response(),
            OperationContainer::GetFromBlob(op) => op.response(),
        }
    }

    /// Assign the response of the held operation once
    pub fn set_response(&self, response: StoreResponse) -> Result<()> {
        match self {
            OperationContainer::AddToTable(op) => op.set_response(response),
            OperationContainer::AddToBlob(op) => op.set_response(response),
            OperationContainer::GetFromTable(op) => op.set_response(response),
            OperationContainer::GetFromBlob(op) => op.set_response(response),
        }
    }
}
