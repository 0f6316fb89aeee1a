//! # duallog
//!
//! Dual-store log persistence.
//!
//! duallog writes structured log records to a keyed-record store (table
//! storage) and to a blob store, reads them back, and chains store operations
//! into sequences whose steps run conditionally on the previous step's
//! outcome.
//!
//! ## Quick Start
//!
//! ```ignore
//! use duallog::prelude::*;
//!
//! let log = DualLog::in_memory()?;
//!
//! // Write to the table store, fall back to blobs only if that fails
//! let mut seq = OperationSequence::new();
//! let record = RawLogRecord::new("orders", SeverityLevel::Exception);
//! let primary = seq.add_to_table(AddToTableOperation::new(
//!     record.clone(),
//!     OperationOptions::for_write().next(SequenceExecutionType::NextOnFails),
//! )?);
//! let fallback = seq.add_to_blob(AddToBlobOperation::new(record, OperationOptions::for_write())?);
//!
//! log.execute_sequence_async(&seq, &CancellationToken::new()).await?;
//! ```
//!
//! ## Crates
//!
//! - `duallog-core`: records, operations, sequences, responses
//! - `duallog-storage`: backing-store traits and in-memory stores
//! - `duallog-engine`: admission, naming, retry, sequence execution

#![warn(missing_docs)]

mod error;
mod logger;
mod telemetry;
mod types;

pub mod prelude;

// Re-export main entry points
pub use error::{Error, Result};
pub use logger::{DualLog, DualLogBuilder};
pub use telemetry::init_tracing;

// Re-export types
pub use types::*;
