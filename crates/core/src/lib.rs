//! Core types for duallog
//!
//! This crate defines the types shared by the storage adapters and the
//! orchestration engine:
//! - [`SeverityLevel`]: the six ordered severity tiers
//! - [`RawLogRecord`] / [`LogRecord`]: the record as submitted and as stored
//! - [`TableEntity`]: the flattened property bag persisted in a keyed store
//! - [`BackendReply`] / [`StoreResponse`]: physical and engine-level outcomes
//! - [`operation`]: the four store operations, their container and the
//!   ordered [`OperationSequence`]

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entity;
pub mod error;
pub mod operation;
pub mod record;
pub mod response;
pub mod sequence;
pub mod severity;

pub use entity::TableEntity;
pub use error::{Error, Result};
pub use operation::{
    AddToBlobOperation, AddToTableOperation, CategoryMismatch, ContainedOperation,
    GetFromBlobOperation, GetFromTableOperation, OperationCategory, OperationContainer,
    OperationOptions, ResponseSlot, SequenceExecutionType,
};
pub use record::{CallSite, ExceptionInfo, LogRecord, RawLogRecord, StackFrame, VerboseLabelFill};
pub use response::{
    BackendReply, BackendStatus, FailureKind, ResponseContext, StoreResponse, StoreStatus,
};
pub use sequence::OperationSequence;
pub use severity::{SeverityLevel, SeverityTier};

/// Number of generic labels and of verbose labels carried by a record.
pub const LABEL_COUNT: usize = 10;
