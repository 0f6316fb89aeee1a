//! Main entry point for duallog.
//!
//! This module provides the `DualLog` struct, which owns a [`LogEngine`]
//! together with the two backing stores it writes to.

use crate::error::{Error, Result};
use duallog_core::{OperationSequence, RawLogRecord, StoreResponse, VerboseLabelFill};
use duallog_engine::{
    AdmissionFilter, BlobWriteOptions, CancellationToken, EngineConfig, ExecutionReport,
    KeyNamingStrategy, LogEngine, ReadOptions, RetryPolicy, Sleeper, WriteOptions,
};
use duallog_storage::{BlobStore, InMemoryBlobStore, InMemoryKeyedStore, KeyedRecordStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Dual-store log persistence.
///
/// Create one with [`DualLog::in_memory`] or [`DualLog::builder`].
///
/// # Example
///
/// ```ignore
/// use duallog::prelude::*;
///
/// let log = DualLog::in_memory()?;
///
/// let record = RawLogRecord::new("checkout", SeverityLevel::Error)
///     .with_message("payment declined");
/// let response = log.add_to_keyed_store(record, WriteOptions::default()).await?;
/// assert!(response.is_success());
/// ```
pub struct DualLog {
    engine: LogEngine,
    keyed: Arc<dyn KeyedRecordStore>,
    blob: Arc<dyn BlobStore>,
}

impl DualLog {
    /// Create a logger backed by in-memory stores.
    ///
    /// Uses the default configuration: three attempts, 1s base delay,
    /// allow-all admission.
    pub fn in_memory() -> Result<Self> {
        Self::builder().in_memory().build()
    }

    /// Create a builder.
    pub fn builder() -> DualLogBuilder {
        DualLogBuilder::new()
    }

    /// The engine behind this logger.
    pub fn engine(&self) -> &LogEngine {
        &self.engine
    }

    /// The keyed-record store.
    pub fn keyed_store(&self) -> &Arc<dyn KeyedRecordStore> {
        &self.keyed
    }

    /// The blob store.
    pub fn blob_store(&self) -> &Arc<dyn BlobStore> {
        &self.blob
    }

    /// Write `record` to the keyed store.
    ///
    /// # Arguments
    ///
    /// * `record` - the record to persist
    /// * `options` - optional table override plus retry/creation options
    pub async fn add_to_keyed_store(
        &self,
        record: RawLogRecord,
        options: WriteOptions,
    ) -> Result<StoreResponse> {
        self.engine
            .add_to_keyed_store(record, options)
            .await
            .map_err(Error::from)
    }

    /// Write `record` to the blob store.
    pub async fn add_to_blob_store(
        &self,
        record: RawLogRecord,
        options: BlobWriteOptions,
    ) -> Result<StoreResponse> {
        self.engine
            .add_to_blob_store(record, options)
            .await
            .map_err(Error::from)
    }

    /// Read one record from the keyed store.
    pub async fn get_from_keyed_store(
        &self,
        table_name: &str,
        partition_key: &str,
        row_key: &str,
        options: ReadOptions,
    ) -> Result<StoreResponse> {
        self.engine
            .get_from_keyed_store(table_name, partition_key, row_key, options)
            .await
            .map_err(Error::from)
    }

    /// Read one record from the blob store.
    pub async fn get_from_blob_store(
        &self,
        container_name: &str,
        blob_name: &str,
        options: ReadOptions,
    ) -> Result<StoreResponse> {
        self.engine
            .get_from_blob_store(container_name, blob_name, options)
            .await
            .map_err(Error::from)
    }

    /// Execute `sequence`, blocking the calling thread.
    ///
    /// Must not be called from inside a tokio runtime; use
    /// [`execute_sequence_async`](Self::execute_sequence_async) there.
    pub fn execute_sequence(&self, sequence: &OperationSequence) -> Result<ExecutionReport> {
        self.engine.execute_sequence(sequence).map_err(Error::from)
    }

    /// Execute `sequence` until done or until `cancel` fires.
    pub async fn execute_sequence_async(
        &self,
        sequence: &OperationSequence,
        cancel: &CancellationToken,
    ) -> Result<ExecutionReport> {
        self.engine
            .execute_sequence_async(sequence, cancel)
            .await
            .map_err(Error::from)
    }
}

impl std::fmt::Debug for DualLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualLog").field("engine", &self.engine).finish()
    }
}

/// Builder for [`DualLog`].
///
/// # Example
///
/// ```ignore
/// let log = DualLog::builder()
///     .keyed_store(Arc::new(my_table_client))
///     .blob_store(Arc::new(my_blob_client))
///     .config_file("duallog.toml")
///     .build()?;
/// ```
#[derive(Default)]
pub struct DualLogBuilder {
    keyed: Option<Arc<dyn KeyedRecordStore>>,
    blob: Option<Arc<dyn BlobStore>>,
    config: Option<EngineConfig>,
    config_path: Option<PathBuf>,
    retry_policy: Option<RetryPolicy>,
    sleeper: Option<Arc<dyn Sleeper>>,
    naming: Option<KeyNamingStrategy>,
    admission: Option<AdmissionFilter>,
    verbose_fill: Option<VerboseLabelFill>,
}

impl DualLogBuilder {
    /// Create a builder with nothing configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use fresh in-memory stores for both backends.
    pub fn in_memory(mut self) -> Self {
        self.keyed = Some(Arc::new(InMemoryKeyedStore::new()));
        self.blob = Some(Arc::new(InMemoryBlobStore::new()));
        self
    }

    /// Set the keyed-record store.
    pub fn keyed_store(mut self, store: Arc<dyn KeyedRecordStore>) -> Self {
        self.keyed = Some(store);
        self
    }

    /// Set the blob store.
    pub fn blob_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blob = Some(store);
        self
    }

    /// Use `config` as the base configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load the base configuration from a TOML file at build time.
    ///
    /// Ignored when [`config`](Self::config) is also set.
    pub fn config_file(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Override the configured retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Set the sleeper used between attempts.
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Set the naming strategy.
    pub fn naming(mut self, naming: KeyNamingStrategy) -> Self {
        self.naming = Some(naming);
        self
    }

    /// Override the configured admission filter.
    pub fn admission(mut self, admission: AdmissionFilter) -> Self {
        self.admission = Some(admission);
        self
    }

    /// Set how verbose labels are derived from verbose details.
    pub fn verbose_label_fill(mut self, fill: VerboseLabelFill) -> Self {
        self.verbose_fill = Some(fill);
        self
    }

    /// Build the logger.
    ///
    /// # Errors
    ///
    /// `MissingArgument` when a store is missing, `Config` when the
    /// configuration file cannot be read or is invalid.
    pub fn build(self) -> Result<DualLog> {
        let keyed = self
            .keyed
            .ok_or_else(|| Error::MissingArgument("keyed_store".to_string()))?;
        let blob = self
            .blob
            .ok_or_else(|| Error::MissingArgument("blob_store".to_string()))?;

        let config = match (self.config, self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) => EngineConfig::from_file(&path)?,
            (None, None) => EngineConfig::default(),
        };

        let mut engine = LogEngine::builder()
            .keyed_store(Arc::clone(&keyed))
            .blob_store(Arc::clone(&blob))
            .config(config);
        if let Some(policy) = self.retry_policy {
            engine = engine.retry_policy(policy);
        }
        if let Some(sleeper) = self.sleeper {
            engine = engine.sleeper(sleeper);
        }
        if let Some(naming) = self.naming {
            engine = engine.naming(naming);
        }
        if let Some(admission) = self.admission {
            engine = engine.admission(admission);
        }
        if let Some(fill) = self.verbose_fill {
            engine = engine.verbose_label_fill(fill);
        }

        let engine = engine.build()?;
        info!(engine = ?engine, "duallog ready");
        Ok(DualLog {
            engine,
            keyed,
            blob,
        })
    }
}

impl std::fmt::Debug for DualLogBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualLogBuilder")
            .field("has_keyed_store", &self.keyed.is_some())
            .field("has_blob_store", &self.blob.is_some())
            .field("config", &self.config)
            .field("config_path", &self.config_path)
            .finish()
    }
}
