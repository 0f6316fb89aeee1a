//! Public types for the duallog API.
//!
//! This module re-exports types from internal crates with a clean public interface.

// Records and severities
pub use duallog_core::{
    CallSite, ExceptionInfo, LogRecord, RawLogRecord, SeverityLevel, SeverityTier, StackFrame,
    TableEntity, VerboseLabelFill, LABEL_COUNT,
};

// Operations and sequences
pub use duallog_core::{
    AddToBlobOperation, AddToTableOperation, CategoryMismatch, ContainedOperation,
    GetFromBlobOperation, GetFromTableOperation, OperationCategory, OperationContainer,
    OperationOptions, OperationSequence, SequenceExecutionType,
};

// Responses
pub use duallog_core::{
    BackendReply, BackendStatus, FailureKind, ResponseContext, StoreResponse, StoreStatus,
};

// Engine
pub use duallog_engine::{
    Admission, AdmissionConfig, AdmissionFilter, BlobWriteOptions, CancellationToken,
    DerivedKeys, EngineConfig, ExecutionReport, KeyNamingStrategy, LogEngine, ReadOptions,
    ReadPredicate, RecordingSleeper, RetryConfig, RetryPolicy, SeverityTierFilter, Sleeper,
    StepReport, StepState, TokioSleeper, WriteOptions, WritePredicate,
};

// Backing stores
pub use duallog_storage::{BlobStore, InMemoryBlobStore, InMemoryKeyedStore, KeyedRecordStore};
