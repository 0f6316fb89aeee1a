//! Cancellation of running sequences

use crate::common::*;
use duallog::*;
use duallog_storage::{Fault, FaultScript};
use std::sync::Arc;
use std::time::Duration;

fn two_step_sequence() -> (
    OperationSequence,
    Arc<AddToTableOperation>,
    Arc<AddToBlobOperation>,
) {
    let raw = record(SeverityLevel::Error);
    let mut seq = OperationSequence::new();
    let table = seq.add_to_table(
        AddToTableOperation::new(raw.clone(), OperationOptions::for_write()).unwrap(),
    );
    let blob =
        seq.add_to_blob(AddToBlobOperation::new(raw, OperationOptions::for_write()).unwrap());
    (seq, table, blob)
}

#[tokio::test]
async fn cancelling_a_hung_call_skips_the_rest() {
    let t = TestLog::with_scripts(
        FaultScript::new().always_on_write(Fault::Hang),
        FaultScript::new(),
    );
    let (seq, table, blob) = two_step_sequence();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        t.log.execute_sequence_async(&seq, &cancel),
    )
    .await
    .expect("cancellation did not interrupt the hung call")
    .unwrap();

    assert!(report.was_cancelled());
    assert_eq!(report.state(0), Some(StepState::Cancelled));
    assert_eq!(report.state(1), Some(StepState::Skipped));
    assert!(table.response().is_none());
    assert!(blob.response().is_none());
    assert_eq!(t.blob.calls().write_calls(), 0);
}

#[tokio::test]
async fn cancelling_during_backoff_stops_retrying() {
    // Real sleeper so the token has a wait to interrupt
    let keyed = Arc::new(duallog_storage::FaultyKeyedStore::new(
        InMemoryKeyedStore::new(),
        FaultScript::new().always_on_write(Fault::Fail(BackendStatus::SERVICE_UNAVAILABLE)),
    ));
    let log = DualLog::builder()
        .keyed_store(keyed.clone())
        .blob_store(Arc::new(InMemoryBlobStore::new()))
        .retry_policy(RetryPolicy::new(5).with_base_delay(Duration::from_secs(60)))
        .build()
        .unwrap();
    let (seq, table, _) = two_step_sequence();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        log.execute_sequence_async(&seq, &cancel),
    )
    .await
    .expect("cancellation did not interrupt the backoff")
    .unwrap();

    assert_eq!(report.state(0), Some(StepState::Cancelled));
    assert_eq!(keyed.calls().write_calls(), 1);
    assert!(table.response().is_none());
}

#[tokio::test]
async fn pre_cancelled_token_runs_nothing() {
    let t = TestLog::new();
    let (seq, table, blob) = two_step_sequence();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = t.log.execute_sequence_async(&seq, &cancel).await.unwrap();

    assert_eq!(report.state(0), Some(StepState::Cancelled));
    assert_eq!(report.state(1), Some(StepState::Skipped));
    assert_eq!(report.executed_count(), 0);
    assert!(table.response().is_none());
    assert!(blob.response().is_none());
    assert_eq!(t.keyed.calls().write_calls(), 0);
    assert_eq!(t.keyed.inner().table_count(), 0);
}

#[tokio::test]
async fn completed_steps_keep_their_responses() {
    let t = TestLog::with_scripts(
        FaultScript::new(),
        FaultScript::new().always_on_write(Fault::Hang),
    );
    let (seq, table, blob) = two_step_sequence();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let report = t.log.execute_sequence_async(&seq, &cancel).await.unwrap();

    assert_eq!(report.state(0), Some(StepState::Executed(StoreStatus::Success)));
    assert_eq!(report.state(1), Some(StepState::Cancelled));
    assert!(table.response().unwrap().is_success());
    assert!(blob.response().is_none());
}

#[tokio::test]
async fn cancelled_token_skips_invalid_and_denied_steps() {
    let t = TestLog::with_admission(
        AdmissionFilter::new().with_write_tier(Some(SeverityTierFilter::Exception)),
    );
    let raw = record(SeverityLevel::Error);
    let mut seq = OperationSequence::new();
    let invalid = seq.add_to_table(
        AddToTableOperation::new(raw.clone(), OperationOptions::for_write())
            .unwrap()
            .with_table_name("bad-name"),
    );
    let denied =
        seq.add_to_blob(AddToBlobOperation::new(raw, OperationOptions::for_write()).unwrap());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = t.log.execute_sequence_async(&seq, &cancel).await.unwrap();

    assert_eq!(report.state(0), Some(StepState::Cancelled));
    assert_eq!(report.state(1), Some(StepState::Skipped));
    assert!(invalid.response().is_none());
    assert!(denied.response().is_none());
}
