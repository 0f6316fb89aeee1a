//! Fault-injecting store wrappers
//!
//! Wraps a backing store and replays scripted replies before delegating to
//! it. Useful for exercising retry and continuation logic without a real
//! backend.
//!
//! Each call kind (ensure, write, read) has its own lane. A lane first drains
//! its queued faults in order, then falls back to its repeat fault (if set),
//! then passes through to the inner store.

use async_trait::async_trait;
use duallog_core::{BackendReply, BackendStatus, StoreStatus, TableEntity};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::trace;

use crate::backend::{BlobStore, KeyedRecordStore};

/// One scripted reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Delegate to the inner store
    Pass,
    /// Fail with the given status code
    Fail(BackendStatus),
    /// Fail without a status code
    FailWithoutCode,
    /// Delegate, then downgrade a successful reply to `Warning` keeping its value
    WarnWithValue,
    /// Reply `Warning` with no value
    WarnWithoutValue,
    /// Never reply
    Hang,
}

#[derive(Debug, Default)]
struct Lane {
    queued: VecDeque<Fault>,
    repeat: Option<Fault>,
}

impl Lane {
    fn next(&mut self) -> Fault {
        self.queued
            .pop_front()
            .or(self.repeat)
            .unwrap_or(Fault::Pass)
    }
}

/// Scripted faults per call kind
#[derive(Debug, Default)]
pub struct FaultScript {
    ensure: Lane,
    write: Lane,
    read: Lane,
}

impl FaultScript {
    /// Empty script: every call passes through
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue faults for ensure-exists calls
    pub fn on_ensure(mut self, faults: impl IntoIterator<Item = Fault>) -> Self {
        self.ensure.queued.extend(faults);
        self
    }

    /// Queue faults for insert/upload calls
    pub fn on_write(mut self, faults: impl IntoIterator<Item = Fault>) -> Self {
        self.write.queued.extend(faults);
        self
    }

    /// Queue faults for retrieve/download calls
    pub fn on_read(mut self, faults: impl IntoIterator<Item = Fault>) -> Self {
        self.read.queued.extend(faults);
        self
    }

    /// Apply `fault` to every ensure call once the queue is drained
    pub fn always_on_ensure(mut self, fault: Fault) -> Self {
        self.ensure.repeat = Some(fault);
        self
    }

    /// Apply `fault` to every write call once the queue is drained
    pub fn always_on_write(mut self, fault: Fault) -> Self {
        self.write.repeat = Some(fault);
        self
    }

    /// Apply `fault` to every read call once the queue is drained
    pub fn always_on_read(mut self, fault: Fault) -> Self {
        self.read.repeat = Some(fault);
        self
    }
}

/// Number of calls that reached a wrapper, per kind
#[derive(Debug, Default)]
pub struct CallCounter {
    ensure: AtomicU32,
    write: AtomicU32,
    read: AtomicU32,
}

impl CallCounter {
    /// Ensure-exists calls
    pub fn ensure_calls(&self) -> u32 {
        self.ensure.load(Ordering::Acquire)
    }

    /// Insert/upload calls
    pub fn write_calls(&self) -> u32 {
        self.write.load(Ordering::Acquire)
    }

    /// Retrieve/download calls
    pub fn read_calls(&self) -> u32 {
        self.read.load(Ordering::Acquire)
    }

    fn bump(counter: &AtomicU32) {
        counter.fetch_add(1, Ordering::AcqRel);
    }
}

/// Run `fault` against `delegate`
async fn apply<T, F>(fault: Fault, delegate: F) -> BackendReply<T>
where
    F: std::future::Future<Output = BackendReply<T>>,
{
    if fault != Fault::Pass {
        trace!(fault = ?fault, "injecting scripted reply");
    }
    match fault {
        Fault::Pass => delegate.await,
        Fault::Fail(code) => BackendReply::failure(code, format!("injected failure {}", code)),
        Fault::FailWithoutCode => BackendReply {
            status: StoreStatus::Failure,
            value: None,
            code: None,
            message: Some("injected failure without status code".to_string()),
        },
        Fault::WarnWithValue => {
            let mut reply = delegate.await;
            if reply.value.is_some() {
                reply.status = StoreStatus::Warning;
                reply.message = Some("injected warning".to_string());
            }
            reply
        }
        Fault::WarnWithoutValue => BackendReply::warning(None, "injected warning"),
        Fault::Hang => std::future::pending().await,
    }
}

macro_rules! faulty_wrapper {
    ($(#[$meta:meta])* $name:ident, $bound:ident) => {
        $(#[$meta])*
        pub struct $name<S: $bound> {
            inner: S,
            script: Mutex<FaultScript>,
            calls: Arc<CallCounter>,
        }

        impl<S: $bound> $name<S> {
            /// Wrap `inner` with `script`
            pub fn new(inner: S, script: FaultScript) -> Self {
                Self {
                    inner,
                    script: Mutex::new(script),
                    calls: Arc::new(CallCounter::default()),
                }
            }

            /// Shared call counter, readable after the wrapper is moved
            pub fn calls(&self) -> Arc<CallCounter> {
                Arc::clone(&self.calls)
            }

            /// The wrapped store
            pub fn inner(&self) -> &S {
                &self.inner
            }

            /// Replace the script
            pub fn set_script(&self, script: FaultScript) {
                *self.script.lock() = script;
            }

            fn next_ensure(&self) -> Fault {
                CallCounter::bump(&self.calls.ensure);
                self.script.lock().ensure.next()
            }

            fn next_write(&self) -> Fault {
                CallCounter::bump(&self.calls.write);
                self.script.lock().write.next()
            }

            fn next_read(&self) -> Fault {
                CallCounter::bump(&self.calls.read);
                self.script.lock().read.next()
            }
        }
    };
}

faulty_wrapper!(
    /// Keyed store wrapper replaying scripted faults
    FaultyKeyedStore,
    KeyedRecordStore
);

faulty_wrapper!(
    /// Blob store wrapper replaying scripted faults
    FaultyBlobStore,
    BlobStore
);

#[async_trait]
impl<S: KeyedRecordStore> KeyedRecordStore for FaultyKeyedStore<S> {
    async fn ensure_table(&self, table: &str) -> BackendReply<()> {
        let fault = self.next_ensure();
        apply(fault, self.inner.ensure_table(table)).await
    }

    async fn insert(&self, table: &str, entity: &TableEntity) -> BackendReply<()> {
        let fault = self.next_write();
        apply(fault, self.inner.insert(table, entity)).await
    }

    async fn retrieve(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> BackendReply<TableEntity> {
        let fault = self.next_read();
        apply(fault, self.inner.retrieve(table, partition_key, row_key)).await
    }
}

#[async_trait]
impl<S: BlobStore> BlobStore for FaultyBlobStore<S> {
    async fn ensure_container(&self, container: &str) -> BackendReply<()> {
        let fault = self.next_ensure();
        apply(fault, self.inner.ensure_container(container)).await
    }

    async fn upload(&self, container: &str, blob: &str, payload: &[u8]) -> BackendReply<()> {
        let fault = self.next_write();
        apply(fault, self.inner.upload(container, blob, payload)).await
    }

    async fn download(&self, container: &str, blob: &str) -> BackendReply<Vec<u8>> {
        let fault = self.next_read();
        apply(fault, self.inner.download(container, blob)).await
    }
}
