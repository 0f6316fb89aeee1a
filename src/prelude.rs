//! Convenient imports for duallog.
//!
//! ```ignore
//! use duallog::prelude::*;
//!
//! let log = DualLog::in_memory()?;
//! ```

// Main entry point
pub use crate::logger::{DualLog, DualLogBuilder};

// Error handling
pub use crate::error::{Error, Result};

// Records
pub use crate::types::{RawLogRecord, LogRecord, SeverityLevel};

// Operations
pub use crate::types::{
    AddToBlobOperation, AddToTableOperation, GetFromBlobOperation, GetFromTableOperation,
    OperationOptions, OperationSequence, SequenceExecutionType,
};

// Options and outcomes
pub use crate::types::{
    BlobWriteOptions, CancellationToken, ReadOptions, StoreResponse, StoreStatus, WriteOptions,
};

// Filters
pub use crate::types::{AdmissionFilter, SeverityTierFilter};
