//! In-memory backing stores
//!
//! Reference implementations of both store traits, used by tests and by the
//! in-memory facade constructor.
//!
//! # Design
//!
//! - DashMap keyed by table/container name: writers only lock their own shard
//! - FxHashMap inside each shard: O(1) lookups
//! - Per-destination shards: different tables never contend
//!
//! Existence is explicit: a table or container must be ensured before it can
//! be written or read, mirroring the cloud backends.

use async_trait::async_trait;
use dashmap::DashMap;
use duallog_core::{BackendReply, BackendStatus, TableEntity};
use rustc_hash::FxHashMap;

use crate::backend::{BlobStore, KeyedRecordStore};

type EntityKey = (String, String);

/// Entities of one table
#[derive(Debug, Default)]
struct TableShard {
    entities: FxHashMap<EntityKey, TableEntity>,
}

/// Keyed-record store held in memory
///
/// # Example
///
/// ```ignore
/// let store = InMemoryKeyedStore::new();
/// store.ensure_table("Logger202401Low").await;
/// store.insert("Logger202401Low", &entity).await;
/// ```
pub struct InMemoryKeyedStore {
    tables: DashMap<String, TableShard>,
}

impl InMemoryKeyedStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
        }
    }

    /// Check if a table exists
    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Number of tables
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Number of entities in `table`
    pub fn entity_count(&self, table: &str) -> usize {
        self.tables
            .get(table)
            .map(|shard| shard.entities.len())
            .unwrap_or(0)
    }

    /// Names of all tables, sorted
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.tables.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for InMemoryKeyedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryKeyedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryKeyedStore")
            .field("table_count", &self.table_count())
            .finish()
    }
}

#[async_trait]
impl KeyedRecordStore for InMemoryKeyedStore {
    async fn ensure_table(&self, table: &str) -> BackendReply<()> {
        if self.tables.contains_key(table) {
            return BackendReply::warning(Some(()), format!("table {} already exists", table));
        }
        self.tables.entry(table.to_string()).or_default();
        BackendReply::success(())
    }

    async fn insert(&self, table: &str, entity: &TableEntity) -> BackendReply<()> {
        let Some(mut shard) = self.tables.get_mut(table) else {
            return BackendReply::failure(
                BackendStatus::NOT_FOUND,
                format!("table {} not found", table),
            );
        };
        let key = (entity.partition_key.clone(), entity.row_key.clone());
        if shard.entities.contains_key(&key) {
            return BackendReply::failure(
                BackendStatus::CONFLICT,
                format!("entity {}/{} already exists", key.0, key.1),
            );
        }
        shard.entities.insert(key, entity.clone());
        BackendReply::success(())
    }

    async fn retrieve(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> BackendReply<TableEntity> {
        let Some(shard) = self.tables.get(table) else {
            return BackendReply::failure(
                BackendStatus::NOT_FOUND,
                format!("table {} not found", table),
            );
        };
        let key = (partition_key.to_string(), row_key.to_string());
        match shard.entities.get(&key) {
            Some(entity) => BackendReply::success(entity.clone()),
            None => BackendReply::failure(
                BackendStatus::NOT_FOUND,
                format!("entity {}/{} not found", partition_key, row_key),
            ),
        }
    }
}

/// Blob store held in memory
pub struct InMemoryBlobStore {
    containers: DashMap<String, FxHashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            containers: DashMap::new(),
        }
    }

    /// Check if a container exists
    pub fn has_container(&self, container: &str) -> bool {
        self.containers.contains_key(container)
    }

    /// Number of blobs in `container`
    pub fn blob_count(&self, container: &str) -> usize {
        self.containers
            .get(container)
            .map(|blobs| blobs.len())
            .unwrap_or(0)
    }

    /// Blob names in `container`, sorted
    pub fn blob_names(&self, container: &str) -> Vec<String> {
        let mut names: Vec<_> = self
            .containers
            .get(container)
            .map(|blobs| blobs.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("container_count", &self.containers.len())
            .finish()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn ensure_container(&self, container: &str) -> BackendReply<()> {
        if self.containers.contains_key(container) {
            return BackendReply::warning(
                Some(()),
                format!("container {} already exists", container),
            );
        }
        self.containers.entry(container.to_string()).or_default();
        BackendReply::success(())
    }

    async fn upload(&self, container: &str, blob: &str, payload: &[u8]) -> BackendReply<()> {
        match self.containers.get_mut(container) {
            Some(mut blobs) => {
                blobs.insert(blob.to_string(), payload.to_vec());
                BackendReply::success(())
            }
            None => BackendReply::failure(
                BackendStatus::NOT_FOUND,
                format!("container {} not found", container),
            ),
        }
    }

    async fn download(&self, container: &str, blob: &str) -> BackendReply<Vec<u8>> {
        let Some(blobs) = self.containers.get(container) else {
            return BackendReply::failure(
                BackendStatus::NOT_FOUND,
                format!("container {} not found", container),
            );
        };
        match blobs.get(blob) {
            Some(bytes) => BackendReply::success(bytes.clone()),
            None => BackendReply::failure(
                BackendStatus::NOT_FOUND,
                format!("blob {}/{} not found", container, blob),
            ),
        }
    }
}
