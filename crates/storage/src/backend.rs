//! Physical backing-store traits
//!
//! These are the only calls the engine makes against a backend. Retry,
//! admission and naming all live above this layer; an implementation just
//! performs one call and reports what happened.
//!
//! # Naming constraints
//!
//! | Destination | Rule |
//! |-------------|------|
//! | table | letters and digits, starts with a letter, 3–63 chars |
//! | container | lowercase letters, digits, hyphen; 3–63 chars; alphanumeric first/last |
//! | blob | non-empty, may embed `/` path segments |
//!
//! The engine validates names before calling, so implementations may assume
//! well-formed identifiers.

use async_trait::async_trait;
use duallog_core::{BackendReply, TableEntity};

/// Keyed-record ("table") store
#[async_trait]
pub trait KeyedRecordStore: Send + Sync {
    /// Create `table` if it does not exist
    ///
    /// Returns `Success` when created, `Warning` when it already existed.
    async fn ensure_table(&self, table: &str) -> BackendReply<()>;

    /// Insert `entity` into `table`
    ///
    /// Fails with 404 when the table does not exist and 409 when the keys are
    /// already taken.
    async fn insert(&self, table: &str, entity: &TableEntity) -> BackendReply<()>;

    /// Fetch the entity stored under `(partition_key, row_key)`
    ///
    /// A missing entity or a missing table is a 404 failure.
    async fn retrieve(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> BackendReply<TableEntity>;
}

/// Blob/object store
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Create `container` if it does not exist
    ///
    /// Returns `Success` when created, `Warning` when it already existed.
    async fn ensure_container(&self, container: &str) -> BackendReply<()>;

    /// Upload `payload` as `blob` in `container`, replacing any previous content
    async fn upload(&self, container: &str, blob: &str, payload: &[u8]) -> BackendReply<()>;

    /// Download `blob` from `container`
    ///
    /// A missing blob or a missing container is a 404 failure.
    async fn download(&self, container: &str, blob: &str) -> BackendReply<Vec<u8>>;
}
