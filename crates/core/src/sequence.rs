//! Ordered, append-only collection of store operations
//!
//! # Design
//!
//! - Global order: a `Vec<OperationContainer>` in insertion order
//! - Category views: four `Vec<Arc<…>>` holding the same instances
//! - Append-only: no removal or reordering once added
//!
//! Because the views share instances with the global order, responses
//! recorded during execution are visible through both.

use crate::operation::{
    AddToBlobOperation, AddToTableOperation, ContainedOperation, GetFromBlobOperation,
    GetFromTableOperation, OperationContainer,
};
use std::sync::Arc;

/// Ordered list of operations executed as one conditional pipeline
///
/// # Example
///
/// ```ignore
/// let mut seq = OperationSequence::new();
/// let write = seq.add_to_table(AddToTableOperation::new(
///     record.clone(),
///     OperationOptions::for_write(),
/// )?);
/// let fallback = seq.add_to_blob(AddToBlobOperation::new(
///     record,
///     OperationOptions::for_write().next(SequenceExecutionType::NextOnFails),
/// )?);
/// engine.execute_sequence(&seq)?;
/// assert!(fallback.response().is_none() || write.response().unwrap().is_failure());
/// ```
#[derive(Debug, Default, Clone)]
pub struct OperationSequence {
    containers: Vec<OperationContainer>,
    add_to_table: Vec<Arc<AddToTableOperation>>,
    add_to_blob: Vec<Arc<AddToBlobOperation>>,
    get_from_table: Vec<Arc<GetFromTableOperation>>,
    get_from_blob: Vec<Arc<GetFromBlobOperation>>,
}

impl OperationSequence {
    /// Create an empty sequence
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a container to the global order and to its category view
    pub fn add_next(&mut self, container: OperationContainer) {
        match &container {
            OperationContainer::AddToTable(op) => self.add_to_table.push(Arc::clone(op)),
            OperationContainer::AddToBlob(op) => self.add_to_blob.push(Arc::clone(op)),
            OperationContainer::GetFromTable(op) => self.get_from_table.push(Arc::clone(op)),
            OperationContainer::GetFromBlob(op) => self.get_from_blob.push(Arc::clone(op)),
        }
        self.containers.push(container);
    }

    /// Append an operation of any kind and return its shared handle
    pub fn push<T: ContainedOperation>(&mut self, op: T) -> Arc<T> {
        let op = Arc::new(op);
        self.add_next(T::into_container(Arc::clone(&op)));
        op
    }

    /// Append a keyed-store write
    pub fn add_to_table(&mut self, op: AddToTableOperation) -> Arc<AddToTableOperation> {
        self.push(op)
    }

    /// Append a blob-store write
    pub fn add_to_blob(&mut self, op: AddToBlobOperation) -> Arc<AddToBlobOperation> {
        self.push(op)
    }

    /// Append a keyed-store read
    pub fn get_from_table(&mut self, op: GetFromTableOperation) -> Arc<GetFromTableOperation> {
        self.push(op)
    }

    /// Append a blob-store read
    pub fn get_from_blob(&mut self, op: GetFromBlobOperation) -> Arc<GetFromBlobOperation> {
        self.push(op)
    }

    /// Number of containers
    pub fn len(&self) -> usize {
        self.containers.len()
    }

    /// Check if the sequence has no containers
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Containers in execution order
    pub fn iter(&self) -> std::slice::Iter<'_, OperationContainer> {
        self.containers.iter()
    }

    /// Container at `index`
    pub fn get(&self, index: usize) -> Option<&OperationContainer> {
        self.containers.get(index)
    }

    /// Keyed-store writes in order
    pub fn add_to_table_operations(&self) -> &[Arc<AddToTableOperation>] {
        &self.add_to_table
    }

    /// Blob-store writes in order
    pub fn add_to_blob_operations(&self) -> &[Arc<AddToBlobOperation>] {
        &self.add_to_blob
    }

    /// Keyed-store reads in order
    pub fn get_from_table_operations(&self) -> &[Arc<GetFromTableOperation>] {
        &self.get_from_table
    }

    /// Blob-store reads in order
    pub fn get_from_blob_operations(&self) -> &[Arc<GetFromBlobOperation>] {
        &self.get_from_blob
    }
}

impl<'a> IntoIterator for &'a OperationSequence {
    type Item = &'a OperationContainer;
    type IntoIter = std::slice::Iter<'a, OperationContainer>;

    fn into_iter(self) -> Self::IntoIter {
        self.containers.iter()
    }
}
