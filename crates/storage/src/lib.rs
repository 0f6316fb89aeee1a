//! Backing-store contracts for duallog
//!
//! This crate defines the two opaque collaborators the engine talks to and
//! ships reference implementations of both:
//! - [`KeyedRecordStore`] / [`BlobStore`]: async traits over physical calls
//! - [`InMemoryKeyedStore`] / [`InMemoryBlobStore`]: DashMap-backed stores
//! - [`FaultyKeyedStore`] / [`FaultyBlobStore`]: wrappers replaying scripted
//!   backend replies before delegating, for retry testing
//!
//! Every call returns a [`BackendReply`](duallog_core::BackendReply); the
//! stores never panic or return `Err` for backend conditions.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod fault;
pub mod memory;

pub use backend::{BlobStore, KeyedRecordStore};
pub use fault::{CallCounter, Fault, FaultScript, FaultyBlobStore, FaultyKeyedStore};
pub use memory::{InMemoryBlobStore, InMemoryKeyedStore};
