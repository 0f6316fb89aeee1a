//! Orchestration engine for duallog
//!
//! This crate turns store operations into backend calls:
//! - [`AdmissionFilter`]: write-path and read-path severity gates
//! - [`KeyNamingStrategy`]: partition/row keys and destination names
//! - [`RetryPolicy`] / [`Retrier`]: bounded retry with exponential backoff
//! - [`BackingStoreAdapter`]: retry-wrapped physical calls with cached
//!   destination handles
//! - [`SequenceExecutor`]: conditional, strictly sequential execution of an
//!   [`OperationSequence`](duallog_core::OperationSequence)
//! - [`LogEngine`]: single-operation entry points plus sequence execution
//! - [`EngineConfig`]: TOML-loadable retry and admission settings

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod admission;
pub mod config;
pub mod engine;
pub mod executor;
pub mod naming;
pub mod retry;

pub use adapter::{BackingStoreAdapter, DestinationHandle, DestinationKind};
pub use admission::{Admission, AdmissionFilter, ReadPredicate, SeverityTierFilter, WritePredicate};
pub use config::{AdmissionConfig, EngineConfig, RetryConfig};
pub use engine::{BlobWriteOptions, LogEngine, LogEngineBuilder, ReadOptions, WriteOptions};
pub use executor::{ExecutionReport, SequenceExecutor, StepReport, StepState};
pub use naming::{DerivedKeys, KeyNamingStrategy};
pub use retry::{
    JitterSource, RecordingSleeper, Retrier, RetryOutcome, RetryPolicy, Sleeper, StopCondition,
    TokioSleeper,
};

pub use tokio_util::sync::CancellationToken;
