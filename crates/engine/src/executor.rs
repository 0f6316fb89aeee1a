//! Conditional sequence execution
//!
//! [`SequenceExecutor`] walks an [`OperationSequence`] in insertion order,
//! one step at a time. Whether a step runs is decided by the previous step's
//! [`SequenceExecutionType`](duallog_core::SequenceExecutionType) and the
//! status it produced; a skipped step counts as "no status".
//!
//! # Step pipeline
//!
//! 1. write admission (adds)
//! 2. key and destination naming (adds)
//! 3. identifier validation
//! 4. retry-wrapped backend call
//! 5. decode and read admission (gets)
//! 6. response assignment
//!
//! Backend, admission and validation failures become the step's
//! [`StoreResponse`]. Only contract violations are returned as `Err`.
//!
//! # Cancellation
//!
//! A triggered [`CancellationToken`] abandons the in-flight attempt, leaves
//! the active step's response unset and skips every remaining step.

use duallog_core::{
    AddToBlobOperation, AddToTableOperation, BackendReply, ContainedOperation, Error,
    GetFromBlobOperation, GetFromTableOperation, LogRecord, OperationCategory,
    OperationContainer, OperationSequence, ResponseContext, Result, StoreResponse, StoreStatus,
    VerboseLabelFill,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::adapter::BackingStoreAdapter;
use crate::admission::{Admission, AdmissionFilter};
use crate::naming::{self, KeyNamingStrategy};
use crate::retry::RetryOutcome;

/// Final state of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    /// Not reached
    Pending,
    /// Ran and recorded a response with this status
    Executed(StoreStatus),
    /// Not run because of the previous step's continuation rule or a cancellation
    Skipped,
    /// Interrupted by cancellation; no response recorded
    Cancelled,
}

/// Outcome of one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    /// Position in the sequence
    pub index: usize,
    /// Operation kind
    pub category: OperationCategory,
    /// Final state
    pub state: StepState,
}

/// Per-step states of one sequence execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    /// One entry per step, in sequence order
    pub steps: Vec<StepReport>,
}

impl ExecutionReport {
    fn pending(sequence: &OperationSequence) -> Self {
        Self {
            steps: sequence
                .iter()
                .enumerate()
                .map(|(index, container)| StepReport {
                    index,
                    category: container.category(),
                    state: StepState::Pending,
                })
                .collect(),
        }
    }

    /// State of step `index`
    pub fn state(&self, index: usize) -> Option<StepState> {
        self.steps.get(index).map(|s| s.state)
    }

    /// Number of executed steps
    pub fn executed_count(&self) -> usize {
        self.count(|s| matches!(s, StepState::Executed(_)))
    }

    /// Number of skipped steps
    pub fn skipped_count(&self) -> usize {
        self.count(|s| s == StepState::Skipped)
    }

    /// Check if execution was interrupted
    pub fn was_cancelled(&self) -> bool {
        self.count(|s| s == StepState::Cancelled) > 0
    }

    fn count(&self, pred: impl Fn(StepState) -> bool) -> usize {
        self.steps.iter().filter(|s| pred(s.state)).count()
    }
}

/// Executes operation sequences against a [`BackingStoreAdapter`]
pub struct SequenceExecutor {
    adapter: BackingStoreAdapter,
    naming: KeyNamingStrategy,
    admission: AdmissionFilter,
    verbose_fill: Option<VerboseLabelFill>,
}

impl SequenceExecutor {
    /// Create an executor
    pub fn new(
        adapter: BackingStoreAdapter,
        naming: KeyNamingStrategy,
        admission: AdmissionFilter,
        verbose_fill: Option<VerboseLabelFill>,
    ) -> Self {
        Self {
            adapter,
            naming,
            admission,
            verbose_fill,
        }
    }

    /// Backing store adapter
    pub fn adapter(&self) -> &BackingStoreAdapter {
        &self.adapter
    }

    /// Naming strategy
    pub fn naming(&self) -> &KeyNamingStrategy {
        &self.naming
    }

    /// Admission filter
    pub fn admission(&self) -> &AdmissionFilter {
        &self.admission
    }

    /// Execute `sequence`, blocking the calling thread
    ///
    /// Drives [`execute_async`](Self::execute_async) on a private
    /// current-thread runtime.
    ///
    /// # Errors
    ///
    /// `Runtime` when called from inside a tokio runtime; nothing is
    /// executed in that case.
    pub fn execute(&self, sequence: &OperationSequence) -> Result<ExecutionReport> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(Error::Runtime(
                "blocking execution inside a tokio runtime; use execute_async".to_string(),
            ));
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Runtime(e.to_string()))?;
        runtime.block_on(self.execute_async(sequence, &CancellationToken::new()))
    }

    /// Execute `sequence`, yielding while waiting on backends and backoff
    ///
    /// # Errors
    ///
    /// `ResponseAlreadySet` if any operation already carries a response.
    /// Nothing is executed in that case.
    pub async fn execute_async(
        &self,
        sequence: &OperationSequence,
        cancel: &CancellationToken,
    ) -> Result<ExecutionReport> {
        if let Some(done) = sequence.iter().find(|c| c.response().is_some()) {
            return Err(Error::ResponseAlreadySet(done.category().as_str()));
        }

        let mut report = ExecutionReport::pending(sequence);
        let mut should_execute = true;
        let mut cancelled = false;

        for (index, container) in sequence.iter().enumerate() {
            let execution_type = container.options().execution_type;

            if cancelled || !should_execute {
                report.steps[index].state = StepState::Skipped;
                info!(step = index, category = %container.category(), "step skipped");
                should_execute = execution_type.next_should_execute(None);
                continue;
            }

            if cancel.is_cancelled() {
                info!(step = index, category = %container.category(), "step cancelled");
                report.steps[index].state = StepState::Cancelled;
                cancelled = true;
                continue;
            }

            match self.run_step(container, cancel).await {
                Some(response) => {
                    let status = response.status;
                    info!(
                        step = index,
                        category = %container.category(),
                        status = ?status,
                        attempts = response.attempts,
                        "step executed"
                    );
                    container.set_response(response)?;
                    report.steps[index].state = StepState::Executed(status);
                    should_execute = execution_type.next_should_execute(Some(status));
                }
                None => {
                    info!(step = index, category = %container.category(), "step cancelled");
                    report.steps[index].state = StepState::Cancelled;
                    cancelled = true;
                }
            }
        }

        Ok(report)
    }

    /// Run one step; `None` when cancelled
    pub(crate) async fn run_step(
        &self,
        container: &OperationContainer,
        cancel: &CancellationToken,
    ) -> Option<StoreResponse> {
        match container {
            OperationContainer::AddToTable(op) => self.add_to_table(op, cancel).await,
            OperationContainer::AddToBlob(op) => self.add_to_blob(op, cancel).await,
            OperationContainer::GetFromTable(op) => self.get_from_table(op, cancel).await,
            OperationContainer::GetFromBlob(op) => self.get_from_blob(op, cancel).await,
        }
    }

    async fn add_to_table(
        &self,
        op: &AddToTableOperation,
        cancel: &CancellationToken,
    ) -> Option<StoreResponse> {
        let raw = op.record();
        let mut context = ResponseContext::new();

        if let Admission::Denied { reason } = self.admission.check_write(raw) {
            return Some(StoreResponse::denied(raw.severity_level, reason, context, 0));
        }

        let keys = self.naming.keys(raw);
        let table = op
            .table_name()
            .map(str::to_string)
            .unwrap_or_else(|| self.naming.table_name(raw, &keys));
        context.insert(ResponseContext::TABLE_NAME, table.as_str());
        context.insert(ResponseContext::PARTITION_KEY, keys.partition_key.as_str());
        context.insert(ResponseContext::ROW_KEY, keys.row_key.as_str());

        let valid = naming::validate_table_name(&table)
            .and_then(|_| naming::validate_key("partition key", &keys.partition_key))
            .and_then(|_| naming::validate_key("row key", &keys.row_key));
        if let Err(reason) = valid {
            return Some(StoreResponse::validation(reason, context));
        }

        let record = match LogRecord::from_raw(
            raw,
            keys.partition_key,
            keys.row_key,
            self.verbose_fill.as_ref(),
        ) {
            Ok(record) => record,
            Err(e) => return Some(StoreResponse::serialization(e.to_string(), context, 0)),
        };
        let entity = record.to_entity();
        let options = op.options();
        let attempts = self.adapter.policy().effective_attempts(options);

        match self
            .adapter
            .add_record(&table, &entity, options.create_if_absent, attempts, cancel)
            .await
        {
            RetryOutcome::Cancelled { .. } => None,
            RetryOutcome::Completed { reply, attempts } => Some(StoreResponse::from_reply(
                reply.map(|_| record),
                attempts,
                context,
            )),
        }
    }

    async fn add_to_blob(
        &self,
        op: &AddToBlobOperation,
        cancel: &CancellationToken,
    ) -> Option<StoreResponse> {
        let raw = op.record();
        let mut context = ResponseContext::new();

        if let Admission::Denied { reason } = self.admission.check_write(raw) {
            return Some(StoreResponse::denied(raw.severity_level, reason, context, 0));
        }

        let keys = self.naming.keys(raw);
        let container = op
            .container_name()
            .map(str::to_string)
            .unwrap_or_else(|| self.naming.blob_container_name(raw, &keys));
        let blob = op
            .blob_name()
            .map(str::to_string)
            .unwrap_or_else(|| self.naming.blob_name(raw, &keys));
        context.insert(ResponseContext::BLOB_CONTAINER_NAME, container.as_str());
        context.insert(ResponseContext::BLOB_NAME, blob.as_str());
        context.insert(ResponseContext::PARTITION_KEY, keys.partition_key.as_str());
        context.insert(ResponseContext::ROW_KEY, keys.row_key.as_str());

        let valid = naming::validate_container_name(&container)
            .and_then(|_| naming::validate_blob_name(&blob))
            .and_then(|_| naming::validate_key("partition key", &keys.partition_key))
            .and_then(|_| naming::validate_key("row key", &keys.row_key));
        if let Err(reason) = valid {
            return Some(StoreResponse::validation(reason, context));
        }

        let encoded = LogRecord::from_raw(
            raw,
            keys.partition_key,
            keys.row_key,
            self.verbose_fill.as_ref(),
        )
        .and_then(|record| record.to_json_bytes().map(|bytes| (record, bytes)));
        let (record, payload) = match encoded {
            Ok(pair) => pair,
            Err(e) => return Some(StoreResponse::serialization(e.to_string(), context, 0)),
        };
        let options = op.options();
        let attempts = self.adapter.policy().effective_attempts(options);

        match self
            .adapter
            .add_blob(
                &container,
                &blob,
                &payload,
                options.create_if_absent,
                attempts,
                cancel,
            )
            .await
        {
            RetryOutcome::Cancelled { .. } => None,
            RetryOutcome::Completed { reply, attempts } => Some(StoreResponse::from_reply(
                reply.map(|_| record),
                attempts,
                context,
            )),
        }
    }

    async fn get_from_table(
        &self,
        op: &GetFromTableOperation,
        cancel: &CancellationToken,
    ) -> Option<StoreResponse> {
        let context = ResponseContext::new()
            .with(ResponseContext::TABLE_NAME, op.table_name())
            .with(ResponseContext::PARTITION_KEY, op.partition_key())
            .with(ResponseContext::ROW_KEY, op.row_key());

        let valid = naming::validate_table_name(op.table_name())
            .and_then(|_| naming::validate_key("partition key", op.partition_key()))
            .and_then(|_| naming::validate_key("row key", op.row_key()));
        if let Err(reason) = valid {
            return Some(StoreResponse::validation(reason, context));
        }

        let options = op.options();
        let attempts = self.adapter.policy().effective_attempts(options);
        match self
            .adapter
            .get_record(
                op.table_name(),
                op.partition_key(),
                op.row_key(),
                options.create_if_absent,
                attempts,
                cancel,
            )
            .await
        {
            RetryOutcome::Cancelled { .. } => None,
            RetryOutcome::Completed { reply, attempts } => Some(self.finish_read(
                reply,
                attempts,
                context,
                |entity| LogRecord::from_entity(&entity),
            )),
        }
    }

    async fn get_from_blob(
        &self,
        op: &GetFromBlobOperation,
        cancel: &CancellationToken,
    ) -> Option<StoreResponse> {
        let context = ResponseContext::new()
            .with(ResponseContext::BLOB_CONTAINER_NAME, op.container_name())
            .with(ResponseContext::BLOB_NAME, op.blob_name());

        let valid = naming::validate_container_name(op.container_name())
            .and_then(|_| naming::validate_blob_name(op.blob_name()));
        if let Err(reason) = valid {
            return Some(StoreResponse::validation(reason, context));
        }

        let options = op.options();
        let attempts = self.adapter.policy().effective_attempts(options);
        match self
            .adapter
            .get_blob(
                op.container_name(),
                op.blob_name(),
                options.create_if_absent,
                attempts,
                cancel,
            )
            .await
        {
            RetryOutcome::Cancelled { .. } => None,
            RetryOutcome::Completed { reply, attempts } => {
                Some(self.finish_read(reply, attempts, context, |bytes| {
                    LogRecord::from_json_bytes(&bytes)
                }))
            }
        }
    }

    /// Decode the payload of a read reply and apply the read gate
    fn finish_read<T>(
        &self,
        reply: BackendReply<T>,
        attempts: u32,
        mut context: ResponseContext,
        decode: impl FnOnce(T) -> Result<LogRecord>,
    ) -> StoreResponse {
        let BackendReply {
            status,
            value,
            code,
            message,
        } = reply;

        let record = match value.map(decode).transpose() {
            Ok(record) => record,
            Err(e) => return StoreResponse::serialization(e.to_string(), context, attempts),
        };

        if let Some(record) = &record {
            if context.get(ResponseContext::PARTITION_KEY).is_none() {
                context.insert(ResponseContext::PARTITION_KEY, record.partition_key());
                context.insert(ResponseContext::ROW_KEY, record.row_key());
            }
            if let Admission::Denied { reason } = self.admission.check_read(record) {
                return StoreResponse::denied(record.severity_level, reason, context, attempts);
            }
        }

        StoreResponse::from_reply(
            BackendReply {
                status,
                value: record,
                code,
                message,
            },
            attempts,
            context,
        )
    }
}

impl std::fmt::Debug for SequenceExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceExecutor")
            .field("adapter", &self.adapter)
            .field("naming", &self.naming)
            .field("admission", &self.admission)
            .field("custom_verbose_fill", &self.verbose_fill.is_some())
            .finish()
    }
}

/// Run a single operation and return its response
pub(crate) async fn run_single<T: ContainedOperation>(
    executor: &SequenceExecutor,
    op: T,
) -> Result<StoreResponse> {
    let mut sequence = OperationSequence::new();
    let handle = sequence.push(op);
    executor
        .execute_async(&sequence, &CancellationToken::new())
        .await?;
    handle
        .response()
        .cloned()
        .ok_or_else(|| Error::Runtime(format!("{} operation produced no response", T::CATEGORY)))
}
