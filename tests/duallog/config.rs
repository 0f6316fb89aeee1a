//! File and TOML configuration

use crate::common::*;
use duallog::*;
use duallog_storage::{Fault, FaultScript, FaultyKeyedStore};
use std::io::Write;
use std::sync::Arc;

const CONFIG: &str = r#"
[retry]
max_attempts = 2
base_delay_ms = 0
max_jitter_ms = 0
seed = 7

[admission]
write_tier = "High"
"#;

fn failing_keyed() -> Arc<FaultyKeyedStore<InMemoryKeyedStore>> {
    Arc::new(FaultyKeyedStore::new(
        InMemoryKeyedStore::new(),
        FaultScript::new().always_on_write(Fault::Fail(BackendStatus::SERVICE_UNAVAILABLE)),
    ))
}

#[tokio::test]
async fn toml_config_sets_attempts_and_admission() {
    let keyed = failing_keyed();
    let log = DualLog::builder()
        .keyed_store(keyed.clone())
        .blob_store(Arc::new(InMemoryBlobStore::new()))
        .config(EngineConfig::from_toml_str(CONFIG).unwrap())
        .build()
        .unwrap();

    let denied = log
        .add_to_keyed_store(record(SeverityLevel::Info), WriteOptions::default())
        .await
        .unwrap();
    assert!(denied.is_denied());
    assert_eq!(keyed.calls().write_calls(), 0);

    let failed = log
        .add_to_keyed_store(record(SeverityLevel::Exception), WriteOptions::default())
        .await
        .unwrap();
    assert!(failed.is_failure());
    assert_eq!(failed.attempts, 2);
    assert_eq!(keyed.calls().write_calls(), 2);
}

#[tokio::test]
async fn config_file_is_loaded_at_build() {
    let path = std::env::temp_dir().join(format!("duallog-{}.toml", uuid::Uuid::new_v4()));
    std::fs::File::create(&path)
        .unwrap()
        .write_all(CONFIG.as_bytes())
        .unwrap();

    let keyed = failing_keyed();
    let log = DualLog::builder()
        .keyed_store(keyed.clone())
        .blob_store(Arc::new(InMemoryBlobStore::new()))
        .config_file(&path)
        .build()
        .unwrap();
    std::fs::remove_file(&path).unwrap();

    let response = log
        .add_to_keyed_store(record(SeverityLevel::Error), WriteOptions::default())
        .await
        .unwrap();
    assert_eq!(response.attempts, 2);
}

#[test]
fn explicit_overrides_beat_the_file() {
    let t = TestLog::with_admission(AdmissionFilter::new());
    assert!(t.log.engine().executor().admission().is_write_allowed(&record(SeverityLevel::Info)));

    let log = DualLog::builder()
        .in_memory()
        .config(EngineConfig::from_toml_str(CONFIG).unwrap())
        .admission(AdmissionFilter::new())
        .retry_policy(RetryPolicy::immediate(6))
        .build()
        .unwrap();
    let executor = log.engine().executor();
    assert!(executor.admission().is_write_allowed(&record(SeverityLevel::Info)));
    assert_eq!(executor.adapter().policy().max_attempts, 6);
}

#[test]
fn invalid_configs_are_rejected() {
    for source in [
        "[retry]\nmax_attempts = 0\n",
        "[admission]\nwrite_tier = \"Loud\"\n",
        "[retry]\nmax_attempts = \"three\"\n",
    ] {
        let err = Error::from(EngineConfig::from_toml_str(source).unwrap_err());
        assert!(err.is_config(), "{}: {:?}", source, err);
    }
}

#[test]
fn missing_config_file_fails_the_build() {
    let err = DualLog::builder()
        .in_memory()
        .config_file("/nonexistent/duallog.toml")
        .build()
        .unwrap_err();
    assert!(err.is_config());
}

#[test]
fn empty_document_uses_defaults() {
    let config = EngineConfig::from_toml_str("").unwrap();
    assert_eq!(config, EngineConfig::default());
    assert_eq!(config.retry_policy(), RetryPolicy::default());
}
