//! Retry bounds and stop conditions

use crate::common::*;
use duallog::*;
use duallog_storage::{Fault, FaultScript};
use std::time::Duration;

fn write_options(max_attempts: u32) -> WriteOptions {
    WriteOptions::default().options(OperationOptions::for_write().max_attempts(max_attempts))
}

#[tokio::test]
async fn always_retryable_failure_makes_exactly_n_attempts() {
    for n in 1..=4u32 {
        let t = TestLog::with_scripts(
            FaultScript::new().always_on_write(Fault::Fail(BackendStatus::SERVICE_UNAVAILABLE)),
            FaultScript::new(),
        );
        let response = t
            .log
            .add_to_keyed_store(record(SeverityLevel::Info), write_options(n))
            .await
            .unwrap();

        assert!(response.is_failure());
        assert_eq!(response.attempts, n);
        assert_eq!(t.keyed.calls().write_calls(), n);
        assert!(matches!(
            response.failure,
            Some(FailureKind::Backend { retryable: true, .. })
        ));

        let delays = t.sleeper.delays();
        assert_eq!(delays.len() as u32, n - 1);
        assert_default_backoff(&delays);
    }
}

#[tokio::test]
async fn single_attempt_without_retry_never_waits() {
    let t = TestLog::with_scripts(
        FaultScript::new().always_on_write(Fault::Fail(BackendStatus::INTERNAL_SERVER_ERROR)),
        FaultScript::new(),
    );
    let response = t
        .log
        .add_to_keyed_store(
            record(SeverityLevel::Info),
            WriteOptions::default()
                .options(OperationOptions::for_write().retry(false).max_attempts(1)),
        )
        .await
        .unwrap();

    assert_eq!(response.status, StoreStatus::Failure);
    assert_eq!(response.attempts, 1);
    assert_eq!(t.keyed.calls().write_calls(), 1);
    assert_eq!(t.sleeper.total(), Duration::ZERO);
    assert_eq!(t.sleeper.count(), 0);
}

#[tokio::test]
async fn disabled_retry_overrides_configured_limit() {
    let t = TestLog::with_scripts(
        FaultScript::new(),
        FaultScript::new().always_on_write(Fault::Fail(BackendStatus::GATEWAY_TIMEOUT)),
    );
    let response = t
        .log
        .add_to_blob_store(
            record(SeverityLevel::Info),
            BlobWriteOptions::default()
                .options(OperationOptions::for_write().retry(false).max_attempts(9)),
        )
        .await
        .unwrap();
    assert_eq!(response.attempts, 1);
    assert_eq!(t.blob.calls().write_calls(), 1);
}

#[tokio::test]
async fn transient_failure_then_success() {
    let t = TestLog::with_scripts(
        FaultScript::new().on_write([
            Fault::Fail(BackendStatus::TOO_MANY_REQUESTS),
            Fault::Fail(BackendStatus::REQUEST_TIMEOUT),
        ]),
        FaultScript::new(),
    );
    let response = t
        .log
        .add_to_keyed_store(record(SeverityLevel::Info), WriteOptions::default())
        .await
        .unwrap();
    assert!(response.is_success());
    assert_eq!(response.attempts, 3);
    assert_eq!(t.sleeper.count(), 2);
}

#[tokio::test]
async fn permanent_failure_is_not_retried() {
    for fault in [Fault::Fail(BackendStatus::BAD_REQUEST), Fault::FailWithoutCode] {
        let t =
            TestLog::with_scripts(FaultScript::new().always_on_write(fault), FaultScript::new());
        let response = t
            .log
            .add_to_keyed_store(record(SeverityLevel::Info), WriteOptions::default())
            .await
            .unwrap();
        assert!(response.is_failure());
        assert_eq!(response.attempts, 1, "{:?}", fault);
        assert!(t.sleeper.delays().is_empty());
    }
}

#[tokio::test]
async fn write_warning_stops_immediately() {
    let t = TestLog::with_scripts(
        FaultScript::new().always_on_write(Fault::WarnWithoutValue),
        FaultScript::new(),
    );
    let response = t
        .log
        .add_to_keyed_store(record(SeverityLevel::Info), WriteOptions::default())
        .await
        .unwrap();
    assert_eq!(response.status, StoreStatus::Warning);
    assert_eq!(response.attempts, 1);
}

// ============================================================================
// Read stop condition
// ============================================================================

async fn written_blob(t: &TestLog) -> (String, String) {
    let response = t
        .log
        .add_to_blob_store(record(SeverityLevel::Info), BlobWriteOptions::default())
        .await
        .unwrap();
    (
        response.context.get(ResponseContext::BLOB_CONTAINER_NAME).unwrap().to_string(),
        response.context.get(ResponseContext::BLOB_NAME).unwrap().to_string(),
    )
}

#[tokio::test]
async fn read_warning_with_value_stops() {
    let t = TestLog::with_scripts(
        FaultScript::new(),
        FaultScript::new().always_on_read(Fault::WarnWithValue),
    );
    let (container, blob) = written_blob(&t).await;

    let read = t
        .log
        .get_from_blob_store(&container, &blob, ReadOptions::default())
        .await
        .unwrap();
    assert_eq!(read.status, StoreStatus::Warning);
    assert!(read.value.is_some());
    assert_eq!(read.attempts, 1);
    assert_eq!(t.blob.calls().read_calls(), 1);
}

#[tokio::test]
async fn read_warning_without_value_keeps_retrying() {
    let t = TestLog::with_scripts(
        FaultScript::new(),
        FaultScript::new().always_on_read(Fault::WarnWithoutValue),
    );
    let (container, blob) = written_blob(&t).await;

    let read = t
        .log
        .get_from_blob_store(&container, &blob, ReadOptions::default())
        .await
        .unwrap();
    assert_eq!(read.status, StoreStatus::Warning);
    assert!(read.value.is_none());
    assert_eq!(read.attempts, 3);
    assert_eq!(t.blob.calls().read_calls(), 3);
    assert_eq!(t.sleeper.count(), 2);
}

#[tokio::test]
async fn read_recovers_after_empty_warning() {
    let t = TestLog::with_scripts(
        FaultScript::new(),
        FaultScript::new().on_read([Fault::WarnWithoutValue]),
    );
    let (container, blob) = written_blob(&t).await;

    let read = t
        .log
        .get_from_blob_store(&container, &blob, ReadOptions::default())
        .await
        .unwrap();
    assert!(read.is_success());
    assert_eq!(read.attempts, 2);
}

// ============================================================================
// Existence checks
// ============================================================================

#[tokio::test]
async fn existence_is_checked_once_per_destination() {
    let t = TestLog::new();
    for _ in 0..3 {
        t.log
            .add_to_keyed_store(record(SeverityLevel::Info), WriteOptions::default())
            .await
            .unwrap();
    }
    assert_eq!(t.keyed.calls().ensure_calls(), 1);
    assert_eq!(t.keyed.inner().table_names(), vec!["Logger202405Low".to_string()]);
}

#[tokio::test]
async fn create_if_absent_false_does_not_create() {
    let t = TestLog::new();
    let response = t
        .log
        .add_to_keyed_store(
            record(SeverityLevel::Info),
            WriteOptions::default().options(OperationOptions::for_write().create_if_absent(false)),
        )
        .await
        .unwrap();
    assert!(matches!(
        response.failure,
        Some(FailureKind::Backend { code: Some(BackendStatus::NOT_FOUND), .. })
    ));
    assert_eq!(t.keyed.inner().table_count(), 0);
}

#[tokio::test]
async fn ensure_retries_transient_failures() {
    let t = TestLog::with_policy(
        FaultScript::new().on_ensure([
            Fault::Fail(BackendStatus::BAD_GATEWAY),
            Fault::Fail(BackendStatus::SERVICE_UNAVAILABLE),
        ]),
        FaultScript::new(),
        RetryPolicy::immediate(3),
    );
    let response = t
        .log
        .add_to_keyed_store(record(SeverityLevel::Info), WriteOptions::default())
        .await
        .unwrap();
    assert!(response.is_success());
    assert_eq!(t.keyed.calls().ensure_calls(), 3);
    assert_eq!(t.sleeper.delays(), vec![Duration::ZERO, Duration::ZERO]);
}
