//! Write-then-read through both stores

use crate::common::*;
use duallog::*;
use std::collections::BTreeMap;
use std::sync::Arc;

#[tokio::test]
async fn keyed_store_round_trip_preserves_every_field() {
    let t = TestLog::new();
    let raw = full_record(SeverityLevel::Exception);

    let written = t
        .log
        .add_to_keyed_store(raw.clone(), WriteOptions::default())
        .await
        .unwrap();
    assert!(written.is_success());
    assert_eq!(written.attempts, 1);
    let stored = written.value.clone().unwrap();

    let read = t
        .log
        .get_from_keyed_store(
            written.context.get(ResponseContext::TABLE_NAME).unwrap(),
            stored.partition_key(),
            stored.row_key(),
            ReadOptions::default(),
        )
        .await
        .unwrap();
    let record = read.value.unwrap();
    assert_eq!(record, stored);

    assert_eq!(record.source, "checkout");
    assert_eq!(record.severity_level, SeverityLevel::Exception);
    assert_eq!(record.timestamp, Some(raw.timestamp));
    assert_eq!(record.category.as_deref(), Some("billing"));
    assert_eq!(record.labels[0].as_deref(), Some("tenant-a"));
    assert_eq!(record.labels[9].as_deref(), Some("canary"));
    assert_eq!(record.verbose_labels[0].as_deref(), Some("order=A-17"));
    assert_eq!(record.verbose_labels[1].as_deref(), Some("region=eu-west"));
    assert_eq!(record.verbose().unwrap(), raw.verbose);
    assert_eq!(record.exception_type.as_deref(), Some("GatewayError"));
    assert_eq!(record.exception_messages.as_deref(), Some("declined\ncard expired"));
    assert_eq!(record.exception_stack_method.as_deref(), Some("charge"));
    assert_eq!(record.exception_stack_line, Some(12));
    assert_eq!(record.exception_stack_column, None);
    assert_eq!(record.call_stack_method.as_deref(), Some("pay"));
    assert_eq!(record.call_stack_line, Some(88));
    assert_eq!(record.call_stack_column, Some(13));
}

#[tokio::test]
async fn blob_store_round_trip_uses_default_names() {
    let t = TestLog::new();
    let raw = full_record(SeverityLevel::Warning);

    let written = t
        .log
        .add_to_blob_store(raw, BlobWriteOptions::default())
        .await
        .unwrap();
    let stored = written.value.clone().unwrap();

    let container = written.context.get(ResponseContext::BLOB_CONTAINER_NAME).unwrap();
    let blob = written.context.get(ResponseContext::BLOB_NAME).unwrap();
    assert_eq!(container, "azlogs-202405");
    assert_eq!(
        blob,
        format!("Warning/2024051709/{}.json", stored.row_key())
    );

    let read = t
        .log
        .get_from_blob_store(container, blob, ReadOptions::default())
        .await
        .unwrap();
    assert!(read.is_success());
    assert_eq!(read.value, Some(stored.clone()));
    assert_eq!(
        read.context.get(ResponseContext::PARTITION_KEY),
        Some(stored.partition_key())
    );
}

#[tokio::test]
async fn table_override_and_custom_verbose_fill() {
    let fill: VerboseLabelFill = Arc::new(|verbose: &BTreeMap<String, String>| {
        let mut labels: [Option<String>; LABEL_COUNT] = Default::default();
        labels[5] = verbose.get("order").cloned();
        labels
    });
    let log = DualLog::builder()
        .in_memory()
        .verbose_label_fill(fill)
        .build()
        .unwrap();

    let written = log
        .add_to_keyed_store(
            full_record(SeverityLevel::Info),
            WriteOptions::default().table_name("AuditTrail"),
        )
        .await
        .unwrap();
    assert_eq!(
        written.context.get(ResponseContext::TABLE_NAME),
        Some("AuditTrail")
    );
    let stored = written.value.unwrap();
    assert_eq!(stored.verbose_labels[5].as_deref(), Some("A-17"));
    assert!(stored.verbose_labels[0].is_none());

    let read = log
        .get_from_keyed_store(
            "AuditTrail",
            stored.partition_key(),
            stored.row_key(),
            ReadOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(read.value, Some(stored));
}

#[tokio::test]
async fn records_with_the_same_timestamp_get_distinct_row_keys() {
    let t = TestLog::new();
    let a = t
        .log
        .add_to_keyed_store(record(SeverityLevel::Info), WriteOptions::default())
        .await
        .unwrap();
    let b = t
        .log
        .add_to_keyed_store(record(SeverityLevel::Info), WriteOptions::default())
        .await
        .unwrap();
    let (a, b) = (a.value.unwrap(), b.value.unwrap());
    assert_eq!(a.partition_key(), b.partition_key());
    assert_ne!(a.row_key(), b.row_key());
    assert_eq!(t.keyed.inner().entity_count("Logger202405Low"), 2);
}

#[tokio::test]
async fn reading_a_missing_record_is_a_permanent_failure() {
    let t = TestLog::new();
    t.log
        .add_to_keyed_store(record(SeverityLevel::Info), WriteOptions::default())
        .await
        .unwrap();

    let read = t
        .log
        .get_from_keyed_store("Logger202405Low", "2024051709", "missing", ReadOptions::default())
        .await
        .unwrap();
    assert!(read.is_failure());
    assert_eq!(read.attempts, 1);
    assert!(matches!(
        read.failure,
        Some(FailureKind::Backend { code: Some(BackendStatus::NOT_FOUND), retryable: false, .. })
    ));
    assert!(t.sleeper.delays().is_empty());
}

#[tokio::test]
async fn invalid_identifiers_fail_before_any_call() {
    let t = TestLog::new();

    let read = t
        .log
        .get_from_keyed_store("Logger202405Low", "pk", "a/b", ReadOptions::default())
        .await
        .unwrap();
    assert!(matches!(read.failure, Some(FailureKind::Validation { .. })));
    assert_eq!(read.attempts, 0);

    let write = t
        .log
        .add_to_blob_store(
            record(SeverityLevel::Info),
            BlobWriteOptions::default().container_name("Not_Valid"),
        )
        .await
        .unwrap();
    assert!(matches!(write.failure, Some(FailureKind::Validation { .. })));

    assert_eq!(t.keyed.calls().read_calls(), 0);
    assert_eq!(t.blob.calls().ensure_calls(), 0);
}

#[tokio::test]
async fn empty_required_arguments_are_contract_violations() {
    let t = TestLog::new();
    let err = t
        .log
        .get_from_blob_store("", "x.json", ReadOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingArgument(ref name) if name == "container_name"));

    let err = t
        .log
        .add_to_keyed_store(
            RawLogRecord::new("", SeverityLevel::Info),
            WriteOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(err.is_contract_violation());
}

mod props {
    use super::*;
    use proptest::prelude::*;

    fn severity() -> impl Strategy<Value = SeverityLevel> {
        prop_oneof![
            Just(SeverityLevel::Info),
            Just(SeverityLevel::Warning),
            Just(SeverityLevel::Error),
            Just(SeverityLevel::FatalError),
            Just(SeverityLevel::Exception),
            Just(SeverityLevel::FatalException),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn arbitrary_text_survives_the_keyed_store(
            level in severity(),
            message in "\\PC{1,64}",
            verbose in proptest::collection::btree_map("[a-z]{1,8}", "\\PC{0,16}", 0..5),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let t = TestLog::new();
            let mut raw = record(level).with_message(message.clone());
            for (k, v) in &verbose {
                raw = raw.with_verbose(k.clone(), v.clone());
            }

            let read = runtime.block_on(async {
                let written = t
                    .log
                    .add_to_keyed_store(raw, WriteOptions::default())
                    .await
                    .unwrap();
                let ctx = &written.context;
                t.log
                    .get_from_keyed_store(
                        ctx.get(ResponseContext::TABLE_NAME).unwrap(),
                        ctx.get(ResponseContext::PARTITION_KEY).unwrap(),
                        ctx.get(ResponseContext::ROW_KEY).unwrap(),
                        ReadOptions::default(),
                    )
                    .await
                    .unwrap()
            });

            prop_assert!(read.is_success());
            let value = read.value.unwrap();
            prop_assert_eq!(value.message.as_deref(), Some(message.as_str()));
            prop_assert_eq!(value.severity_level, level);
            prop_assert_eq!(value.verbose().unwrap(), verbose);
        }
    }
}
