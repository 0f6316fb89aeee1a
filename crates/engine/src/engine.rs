//! Engine entry points
//!
//! [`LogEngine`] runs single operations and whole sequences. Single
//! operations are one-step sequences, so they share the executor's
//! admission, naming, validation and retry pipeline.
//!
//! # Example
//!
//! ```ignore
//! let engine = LogEngine::builder()
//!     .keyed_store(Arc::new(InMemoryKeyedStore::new()))
//!     .blob_store(Arc::new(InMemoryBlobStore::new()))
//!     .build()?;
//!
//! let record = RawLogRecord::new("billing", SeverityLevel::Error).with_message("charge failed");
//! let response = engine.add_to_keyed_store(record, WriteOptions::default()).await?;
//! ```

use duallog_core::{
    AddToBlobOperation, AddToTableOperation, Error, GetFromBlobOperation, GetFromTableOperation,
    OperationOptions, OperationSequence, RawLogRecord, Result, StoreResponse, VerboseLabelFill,
};
use duallog_storage::{BlobStore, KeyedRecordStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::adapter::BackingStoreAdapter;
use crate::admission::AdmissionFilter;
use crate::config::EngineConfig;
use crate::executor::{run_single, ExecutionReport, SequenceExecutor};
use crate::naming::KeyNamingStrategy;
use crate::retry::{JitterSource, Retrier, RetryPolicy, Sleeper, TokioSleeper};

// ============================================================================
// Options
// ============================================================================

/// Options for a keyed-store write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    /// Table override; `None` uses the naming strategy
    pub table_name: Option<String>,
    /// Retry and creation options
    pub options: OperationOptions,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            table_name: None,
            options: OperationOptions::for_write(),
        }
    }
}

impl WriteOptions {
    /// Write to `table_name`
    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    /// Replace the retry and creation options
    pub fn options(mut self, options: OperationOptions) -> Self {
        self.options = options;
        self
    }
}

/// Options for a blob-store write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobWriteOptions {
    /// Container override
    pub container_name: Option<String>,
    /// Blob name override
    pub blob_name: Option<String>,
    /// Retry and creation options
    pub options: OperationOptions,
}

impl Default for BlobWriteOptions {
    fn default() -> Self {
        Self {
            container_name: None,
            blob_name: None,
            options: OperationOptions::for_write(),
        }
    }
}

impl BlobWriteOptions {
    /// Write into `container_name`
    pub fn container_name(mut self, container_name: impl Into<String>) -> Self {
        self.container_name = Some(container_name.into());
        self
    }

    /// Write as `blob_name`
    pub fn blob_name(mut self, blob_name: impl Into<String>) -> Self {
        self.blob_name = Some(blob_name.into());
        self
    }

    /// Replace the retry and creation options
    pub fn options(mut self, options: OperationOptions) -> Self {
        self.options = options;
        self
    }
}

/// Options for a read; the destination is not created by default
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    /// Retry and creation options
    pub options: OperationOptions,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            options: OperationOptions::for_read(),
        }
    }
}

impl ReadOptions {
    /// Replace the retry and creation options
    pub fn options(mut self, options: OperationOptions) -> Self {
        self.options = options;
        self
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Dual-store log engine
#[derive(Debug)]
pub struct LogEngine {
    executor: SequenceExecutor,
}

impl LogEngine {
    /// Start building an engine
    pub fn builder() -> LogEngineBuilder {
        LogEngineBuilder::new()
    }

    /// Sequence executor behind this engine
    pub fn executor(&self) -> &SequenceExecutor {
        &self.executor
    }

    /// Write `record` to the keyed store
    ///
    /// # Errors
    ///
    /// Contract violations only: empty source or a zero attempt limit with
    /// retries enabled. Backend outcomes are in the returned response.
    pub async fn add_to_keyed_store(
        &self,
        record: RawLogRecord,
        options: WriteOptions,
    ) -> Result<StoreResponse> {
        let mut op = AddToTableOperation::new(record, options.options)?;
        if let Some(table) = options.table_name {
            op = op.with_table_name(table);
        }
        run_single(&self.executor, op).await
    }

    /// Write `record` to the blob store
    pub async fn add_to_blob_store(
        &self,
        record: RawLogRecord,
        options: BlobWriteOptions,
    ) -> Result<StoreResponse> {
        let mut op = AddToBlobOperation::new(record, options.options)?;
        if let Some(container) = options.container_name {
            op = op.with_container_name(container);
        }
        if let Some(blob) = options.blob_name {
            op = op.with_blob_name(blob);
        }
        run_single(&self.executor, op).await
    }

    /// Read one record from the keyed store
    pub async fn get_from_keyed_store(
        &self,
        table_name: &str,
        partition_key: &str,
        row_key: &str,
        options: ReadOptions,
    ) -> Result<StoreResponse> {
        let op = GetFromTableOperation::new(table_name, partition_key, row_key, options.options)?;
        run_single(&self.executor, op).await
    }

    /// Read one record from the blob store
    pub async fn get_from_blob_store(
        &self,
        container_name: &str,
        blob_name: &str,
        options: ReadOptions,
    ) -> Result<StoreResponse> {
        let op = GetFromBlobOperation::new(container_name, blob_name, options.options)?;
        run_single(&self.executor, op).await
    }

    /// Execute `sequence`, blocking the calling thread
    pub fn execute_sequence(&self, sequence: &OperationSequence) -> Result<ExecutionReport> {
        self.executor.execute(sequence)
    }

    /// Execute `sequence` until done or until `cancel` fires
    pub async fn execute_sequence_async(
        &self,
        sequence: &OperationSequence,
        cancel: &CancellationToken,
    ) -> Result<ExecutionReport> {
        self.executor.execute_async(sequence, cancel).await
    }
}

/// Builder for [`LogEngine`]
///
/// Both stores are required. Settings not given explicitly come from the
/// [`EngineConfig`] (itself defaulted).
#[derive(Default)]
pub struct LogEngineBuilder {
    keyed: Option<Arc<dyn KeyedRecordStore>>,
    blob: Option<Arc<dyn BlobStore>>,
    config: EngineConfig,
    retry_policy: Option<RetryPolicy>,
    jitter: Option<JitterSource>,
    sleeper: Option<Arc<dyn Sleeper>>,
    naming: KeyNamingStrategy,
    admission: Option<AdmissionFilter>,
    verbose_fill: Option<VerboseLabelFill>,
}

impl LogEngineBuilder {
    /// Empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Keyed-record store
    pub fn keyed_store(mut self, store: Arc<dyn KeyedRecordStore>) -> Self {
        self.keyed = Some(store);
        self
    }

    /// Blob store
    pub fn blob_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blob = Some(store);
        self
    }

    /// Base configuration
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Retry policy, overriding the configuration
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Jitter generator, overriding the configured seed
    pub fn jitter(mut self, jitter: JitterSource) -> Self {
        self.jitter = Some(jitter);
        self
    }

    /// Sleeper used between attempts
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Naming strategy
    pub fn naming(mut self, naming: KeyNamingStrategy) -> Self {
        self.naming = naming;
        self
    }

    /// Admission filter, overriding the configured tiers
    pub fn admission(mut self, admission: AdmissionFilter) -> Self {
        self.admission = Some(admission);
        self
    }

    /// Verbose label derivation
    pub fn verbose_label_fill(mut self, fill: VerboseLabelFill) -> Self {
        self.verbose_fill = Some(fill);
        self
    }

    /// Build the engine
    ///
    /// # Errors
    ///
    /// `MissingArgument` when a store is missing, `Config` when the
    /// configuration or the retry policy is invalid.
    pub fn build(self) -> Result<LogEngine> {
        let keyed = self.keyed.ok_or(Error::MissingArgument("keyed_store"))?;
        let blob = self.blob.ok_or(Error::MissingArgument("blob_store"))?;
        self.config.validate()?;

        let policy = self
            .retry_policy
            .unwrap_or_else(|| self.config.retry_policy());
        if policy.max_attempts == 0 {
            return Err(Error::Config("retry policy max_attempts must be at least 1".to_string()));
        }
        let jitter = self.jitter.unwrap_or_else(|| self.config.jitter_source());
        let sleeper = self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper));
        let admission = self
            .admission
            .unwrap_or_else(|| self.config.admission_filter());

        debug!(
            max_attempts = policy.max_attempts,
            base_delay_ms = policy.base_delay.as_millis() as u64,
            admission = ?admission,
            "building log engine"
        );

        let adapter = BackingStoreAdapter::new(keyed, blob, Retrier::new(policy, jitter, sleeper));
        Ok(LogEngine {
            executor: SequenceExecutor::new(adapter, self.naming, admission, self.verbose_fill),
        })
    }
}

impl std::fmt::Debug for LogEngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogEngineBuilder")
            .field("has_keyed_store", &self.keyed.is_some())
            .field("has_blob_store", &self.blob.is_some())
            .field("config", &self.config)
            .finish()
    }
}
