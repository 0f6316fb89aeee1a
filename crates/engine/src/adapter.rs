//! Retry-wrapped access to the two backing stores
//!
//! [`BackingStoreAdapter`] is the only place physical calls are issued.
//! Every call goes through the shared [`Retrier`].
//!
//! # Destination handles
//!
//! Handles are cached per table or container name. A handle remembers
//! whether existence was confirmed, so `create_if_absent` issues
//! ensure-exists calls only until the first non-failure reply for that
//! destination. Handles are never evicted.

use dashmap::DashMap;
use duallog_core::{BackendReply, StoreStatus, TableEntity};
use duallog_storage::{BlobStore, KeyedRecordStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::retry::{Retrier, RetryOutcome, RetryPolicy, StopCondition};

/// Kind of destination a handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestinationKind {
    /// Keyed-store table
    Table,
    /// Blob-store container
    Container,
}

/// Cached state of one destination
#[derive(Debug)]
pub struct DestinationHandle {
    kind: DestinationKind,
    name: String,
    confirmed: AtomicBool,
}

impl DestinationHandle {
    fn new(kind: DestinationKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            confirmed: AtomicBool::new(false),
        }
    }

    /// Destination kind
    pub fn kind(&self) -> DestinationKind {
        self.kind
    }

    /// Destination name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if existence has been confirmed
    pub fn is_confirmed(&self) -> bool {
        self.confirmed.load(Ordering::Acquire)
    }

    fn confirm(&self) {
        self.confirmed.store(true, Ordering::Release);
    }
}

/// Physical store access under a retry policy
pub struct BackingStoreAdapter {
    keyed: Arc<dyn KeyedRecordStore>,
    blob: Arc<dyn BlobStore>,
    retrier: Retrier,
    handles: DashMap<(DestinationKind, String), Arc<DestinationHandle>>,
}

impl BackingStoreAdapter {
    /// Create an adapter over both stores
    pub fn new(
        keyed: Arc<dyn KeyedRecordStore>,
        blob: Arc<dyn BlobStore>,
        retrier: Retrier,
    ) -> Self {
        Self {
            keyed,
            blob,
            retrier,
            handles: DashMap::new(),
        }
    }

    /// Active retry policy
    pub fn policy(&self) -> &RetryPolicy {
        self.retrier.policy()
    }

    /// Cached handle for a destination, created on first use
    pub fn handle(&self, kind: DestinationKind, name: &str) -> Arc<DestinationHandle> {
        self.handles
            .entry((kind, name.to_string()))
            .or_insert_with(|| Arc::new(DestinationHandle::new(kind, name)))
            .clone()
    }

    /// Number of cached handles
    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    // ========================================================================
    // Keyed store
    // ========================================================================

    /// Insert `entity` into `table`
    pub async fn add_record(
        &self,
        table: &str,
        entity: &TableEntity,
        create_if_absent: bool,
        max_attempts: u32,
        cancel: &CancellationToken,
    ) -> RetryOutcome<()> {
        if create_if_absent {
            if let Some(early) = self
                .ensure(DestinationKind::Table, table, max_attempts, cancel)
                .await
            {
                return early;
            }
        }
        let keyed = &self.keyed;
        self.retrier
            .run(StopCondition::Write, max_attempts, cancel, "insert", move || {
                keyed.insert(table, entity)
            })
            .await
    }

    /// Retrieve one entity from `table`
    pub async fn get_record(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
        create_if_absent: bool,
        max_attempts: u32,
        cancel: &CancellationToken,
    ) -> RetryOutcome<TableEntity> {
        if create_if_absent {
            if let Some(early) = self
                .ensure(DestinationKind::Table, table, max_attempts, cancel)
                .await
            {
                return early;
            }
        }
        let keyed = &self.keyed;
        self.retrier
            .run(StopCondition::Read, max_attempts, cancel, "retrieve", move || {
                keyed.retrieve(table, partition_key, row_key)
            })
            .await
    }

    // ========================================================================
    // Blob store
    // ========================================================================

    /// Upload `payload` as `container/blob`
    pub async fn add_blob(
        &self,
        container: &str,
        blob: &str,
        payload: &[u8],
        create_if_absent: bool,
        max_attempts: u32,
        cancel: &CancellationToken,
    ) -> RetryOutcome<()> {
        if create_if_absent {
            if let Some(early) = self
                .ensure(DestinationKind::Container, container, max_attempts, cancel)
                .await
            {
                return early;
            }
        }
        let store = &self.blob;
        self.retrier
            .run(StopCondition::Write, max_attempts, cancel, "upload", move || {
                store.upload(container, blob, payload)
            })
            .await
    }

    /// Download `container/blob`
    pub async fn get_blob(
        &self,
        container: &str,
        blob: &str,
        create_if_absent: bool,
        max_attempts: u32,
        cancel: &CancellationToken,
    ) -> RetryOutcome<Vec<u8>> {
        if create_if_absent {
            if let Some(early) = self
                .ensure(DestinationKind::Container, container, max_attempts, cancel)
                .await
            {
                return early;
            }
        }
        let store = &self.blob;
        self.retrier
            .run(StopCondition::Read, max_attempts, cancel, "download", move || {
                store.download(container, blob)
            })
            .await
    }

    /// Make sure a destination exists
    ///
    /// Returns `None` when the caller may proceed, otherwise the outcome that
    /// ends the operation (cancellation or a failed ensure).
    async fn ensure<T>(
        &self,
        kind: DestinationKind,
        name: &str,
        max_attempts: u32,
        cancel: &CancellationToken,
    ) -> Option<RetryOutcome<T>> {
        let handle = self.handle(kind, name);
        if handle.is_confirmed() {
            return None;
        }

        let outcome = match kind {
            DestinationKind::Table => {
                let keyed = &self.keyed;
                self.retrier
                    .run(
                        StopCondition::EnsureExists,
                        max_attempts,
                        cancel,
                        "ensure_table",
                        move || keyed.ensure_table(name),
                    )
                    .await
            }
            DestinationKind::Container => {
                let store = &self.blob;
                self.retrier
                    .run(
                        StopCondition::EnsureExists,
                        max_attempts,
                        cancel,
                        "ensure_container",
                        move || store.ensure_container(name),
                    )
                    .await
            }
        };

        match outcome {
            RetryOutcome::Cancelled { attempts } => Some(RetryOutcome::Cancelled { attempts }),
            RetryOutcome::Completed { reply, attempts } => {
                if reply.status == StoreStatus::Failure {
                    warn!(
                        destination = name,
                        kind = ?kind,
                        code = ?reply.code,
                        "could not ensure destination exists"
                    );
                    Some(RetryOutcome::Completed {
                        reply: without_value(reply),
                        attempts,
                    })
                } else {
                    debug!(destination = name, kind = ?kind, "destination confirmed");
                    handle.confirm();
                    None
                }
            }
        }
    }
}

impl std::fmt::Debug for BackingStoreAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackingStoreAdapter")
            .field("retrier", &self.retrier)
            .field("handle_count", &self.handles.len())
            .finish()
    }
}

/// Reuse a valueless reply under a different payload type
fn without_value<T>(reply: BackendReply<()>) -> BackendReply<T> {
    BackendReply {
        status: reply.status,
        value: None,
        code: reply.code,
        message: reply.message,
    }
}
