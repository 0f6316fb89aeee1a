//! Conditional sequence execution

use crate::common::*;
use duallog::*;
use duallog_storage::{Fault, FaultScript};
use SequenceExecutionType::*;

fn add_table(raw: &RawLogRecord, next: SequenceExecutionType) -> AddToTableOperation {
    AddToTableOperation::new(raw.clone(), OperationOptions::for_write().next(next)).unwrap()
}

fn add_blob(raw: &RawLogRecord, next: SequenceExecutionType) -> AddToBlobOperation {
    AddToBlobOperation::new(raw.clone(), OperationOptions::for_write().next(next)).unwrap()
}

/// Table coordinates the default naming assigns to `raw`
fn table_target(raw: &RawLogRecord) -> (String, String, String) {
    let naming = KeyNamingStrategy::new();
    let keys = naming.keys(raw);
    (naming.table_name(raw, &keys), keys.partition_key, keys.row_key)
}

/// Write `raw` to the blob store and return its container and blob names
async fn prewrite_blob(t: &TestLog, raw: RawLogRecord) -> (String, String) {
    let response = t
        .log
        .add_to_blob_store(raw, BlobWriteOptions::default())
        .await
        .unwrap();
    assert!(response.is_success());
    (
        response.context.get(ResponseContext::BLOB_CONTAINER_NAME).unwrap().to_string(),
        response.context.get(ResponseContext::BLOB_NAME).unwrap().to_string(),
    )
}

// ============================================================================
// Fallback pipeline
// ============================================================================

#[tokio::test]
async fn fallback_is_skipped_when_primary_succeeds() {
    let t = TestLog::new();
    let (container, blob) = prewrite_blob(&t, record(SeverityLevel::Info)).await;

    let raw = record(SeverityLevel::Error);
    let (table, pk, rk) = table_target(&raw);

    let mut seq = OperationSequence::new();
    let primary = seq.add_to_table(add_table(&raw, NextOnFails));
    let fallback = seq.add_to_blob(add_blob(&raw, NextAlways));
    let verify_table = seq.get_from_table(
        GetFromTableOperation::new(table, pk, rk, OperationOptions::for_read().next(NextAlways))
            .unwrap(),
    );
    let verify_blob = seq.get_from_blob(
        GetFromBlobOperation::new(container, blob, OperationOptions::for_read()).unwrap(),
    );

    let report = t
        .log
        .execute_sequence_async(&seq, &CancellationToken::new())
        .await
        .unwrap();

    assert!(primary.response().unwrap().is_success());
    assert!(fallback.response().is_none());
    assert_eq!(report.state(1), Some(StepState::Skipped));

    let read = verify_table.response().unwrap();
    assert!(read.is_success());
    assert_eq!(read.value, primary.response().unwrap().value);

    assert!(verify_blob.response().unwrap().is_success());
    assert_eq!(report.executed_count(), 3);

    // Only the prewrite touched the blob store's write path
    assert_eq!(t.blob.calls().write_calls(), 1);
}

#[tokio::test]
async fn fallback_runs_when_primary_fails() {
    let t = TestLog::with_scripts(
        FaultScript::new().always_on_write(Fault::Fail(BackendStatus::FORBIDDEN)),
        FaultScript::new(),
    );
    let raw = record(SeverityLevel::FatalError);

    let mut seq = OperationSequence::new();
    let primary = seq.add_to_table(add_table(&raw, NextOnFails));
    let fallback = seq.add_to_blob(add_blob(&raw, NextAlways));

    t.log.execute_sequence_async(&seq, &CancellationToken::new()).await.unwrap();

    assert!(primary.response().unwrap().is_failure());
    let written = fallback.response().unwrap();
    assert!(written.is_success());
    assert_eq!(t.blob.inner().blob_count("azlogs-202405"), 1);
}

#[tokio::test]
async fn step_type_governs_the_following_step() {
    let t = TestLog::new();
    let (container, blob) = prewrite_blob(&t, record(SeverityLevel::Info)).await;
    let raw = record(SeverityLevel::Warning);
    let (table, pk, rk) = table_target(&raw);

    let mut seq = OperationSequence::new();
    seq.add_to_table(add_table(&raw, NextAlways));
    let blob_write = seq.add_to_blob(add_blob(&raw, NextOnFails));
    let table_read = seq.get_from_table(
        GetFromTableOperation::new(table, pk, rk, OperationOptions::for_read()).unwrap(),
    );
    let blob_read = seq.get_from_blob(
        GetFromBlobOperation::new(container, blob, OperationOptions::for_read()).unwrap(),
    );

    let report = t
        .log
        .execute_sequence_async(&seq, &CancellationToken::new())
        .await
        .unwrap();

    assert!(blob_write.response().unwrap().is_success());
    assert!(table_read.response().is_none());
    // A skipped NextAlways step still lets the next one run
    assert!(blob_read.response().unwrap().is_success());
    assert_eq!(
        report.steps.iter().map(|s| s.state).collect::<Vec<_>>(),
        vec![
            StepState::Executed(StoreStatus::Success),
            StepState::Executed(StoreStatus::Success),
            StepState::Skipped,
            StepState::Executed(StoreStatus::Success),
        ]
    );
}

#[tokio::test]
async fn next_on_complete_continues_after_warning() {
    let t = TestLog::with_scripts(
        FaultScript::new(),
        FaultScript::new().on_read([Fault::WarnWithValue]),
    );
    let (container, blob) = prewrite_blob(&t, record(SeverityLevel::Info)).await;

    let mut seq = OperationSequence::new();
    let first = seq.get_from_blob(
        GetFromBlobOperation::new(
            container.clone(),
            blob.clone(),
            OperationOptions::for_read().next(NextOnComplete),
        )
        .unwrap(),
    );
    let second = seq.get_from_blob(
        GetFromBlobOperation::new(container, blob, OperationOptions::for_read()).unwrap(),
    );

    t.log.execute_sequence_async(&seq, &CancellationToken::new()).await.unwrap();

    let warned = first.response().unwrap();
    assert_eq!(warned.status, StoreStatus::Warning);
    assert!(warned.value.is_some());
    assert!(second.response().unwrap().is_success());
}

#[tokio::test]
async fn next_never_stops_the_chain() {
    let t = TestLog::new();
    let raw = record(SeverityLevel::Info);

    let mut seq = OperationSequence::new();
    seq.add_to_table(add_table(&raw, NextNever));
    let skipped = seq.add_to_blob(add_blob(&raw, NextOnComplete));
    let also_skipped = seq.add_to_blob(add_blob(&raw, NextAlways));

    let report = t
        .log
        .execute_sequence_async(&seq, &CancellationToken::new())
        .await
        .unwrap();
    assert!(skipped.response().is_none());
    // The skipped NextOnComplete step resolves to "do not run"
    assert!(also_skipped.response().is_none());
    assert_eq!(report.skipped_count(), 2);
}

// ============================================================================
// Views and execution modes
// ============================================================================

#[tokio::test]
async fn category_views_observe_recorded_responses() {
    let t = TestLog::new();
    let raw = record(SeverityLevel::Info);

    let mut seq = OperationSequence::new();
    seq.add_next(OperationContainer::new(add_table(&raw, NextAlways)));
    seq.add_next(OperationContainer::new(add_blob(&raw, NextAlways)));
    assert_eq!(seq.len(), 2);

    t.log.execute_sequence_async(&seq, &CancellationToken::new()).await.unwrap();

    assert!(seq.add_to_table_operations()[0].response().unwrap().is_success());
    assert!(seq.add_to_blob_operations()[0].response().unwrap().is_success());

    let container = seq.get(1).unwrap();
    assert!(container.extract::<AddToTableOperation>().is_err());
    let blob_op = container.extract::<AddToBlobOperation>().unwrap();
    assert_eq!(blob_op.response(), container.response());
}

#[test]
fn blocking_execution_matches_async() {
    let t = TestLog::new();
    let raw = record(SeverityLevel::Exception);

    let mut seq = OperationSequence::new();
    let op = seq.add_to_table(add_table(&raw, NextAlways));

    let report = t.log.execute_sequence(&seq).unwrap();
    assert_eq!(report.state(0), Some(StepState::Executed(StoreStatus::Success)));
    assert_eq!(
        op.response().unwrap().context.get(ResponseContext::TABLE_NAME),
        Some("Logger202405High")
    );
}

#[tokio::test]
async fn blocking_execution_inside_a_runtime_is_an_error() {
    let t = TestLog::new();
    let mut seq = OperationSequence::new();
    let op = seq.add_to_table(add_table(&record(SeverityLevel::Info), NextAlways));

    let err = t.log.execute_sequence(&seq).unwrap_err();
    assert!(matches!(err, Error::Runtime(_)));
    assert!(op.response().is_none());
    assert_eq!(t.keyed.calls().write_calls(), 0);
}

#[tokio::test]
async fn executing_a_sequence_twice_is_rejected() {
    let t = TestLog::new();
    let mut seq = OperationSequence::new();
    seq.add_to_table(add_table(&record(SeverityLevel::Info), NextAlways));

    let cancel = CancellationToken::new();
    t.log.execute_sequence_async(&seq, &cancel).await.unwrap();
    let err = t.log.execute_sequence_async(&seq, &cancel).await.unwrap_err();
    assert!(matches!(err, Error::ResponseAlreadySet(_)));
    assert!(err.is_contract_violation());
}

#[tokio::test]
async fn independent_sequences_run_in_parallel() {
    let t = std::sync::Arc::new(TestLog::new());

    let mut handles = Vec::new();
    for i in 0..8 {
        let t = t.clone();
        handles.push(tokio::spawn(async move {
            let raw = record(SeverityLevel::Info).with_label(1, format!("worker-{}", i));
            let mut seq = OperationSequence::new();
            let op = seq.add_to_table(add_table(&raw, NextAlways));
            t.log
                .execute_sequence_async(&seq, &CancellationToken::new())
                .await
                .unwrap();
            op.response().unwrap().status
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StoreStatus::Success);
    }
    assert_eq!(t.keyed.inner().entity_count("Logger202405Low"), 8);
    assert_eq!(t.keyed.calls().write_calls(), 8);
}
