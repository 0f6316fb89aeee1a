//! Outcomes of physical backend calls and of engine operations
//!
//! ## Layers
//!
//! - [`BackendReply`]: what an opaque backing store returned for one call
//! - [`StoreResponse`]: what the engine records on an operation once it has
//!   run admission, naming, validation and the retry loop
//!
//! The engine never throws for expected outcomes. Backend failures, admission
//! denials and validation problems all end up as a `StoreResponse` with
//! [`StoreStatus::Failure`] and a [`FailureKind`] describing why.

use crate::record::LogRecord;
use crate::severity::SeverityLevel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Coarse status of a call or operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreStatus {
    /// Completed as requested
    Success,
    /// Completed with a caveat (e.g. nothing found, already exists)
    Warning,
    /// Did not complete
    Failure,
}

/// Status code reported by a backing store
///
/// Codes follow HTTP semantics, which both cloud backends use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackendStatus(pub u16);

impl BackendStatus {
    /// 400
    pub const BAD_REQUEST: BackendStatus = BackendStatus(400);
    /// 403
    pub const FORBIDDEN: BackendStatus = BackendStatus(403);
    /// 404
    pub const NOT_FOUND: BackendStatus = BackendStatus(404);
    /// 408
    pub const REQUEST_TIMEOUT: BackendStatus = BackendStatus(408);
    /// 409
    pub const CONFLICT: BackendStatus = BackendStatus(409);
    /// 429
    pub const TOO_MANY_REQUESTS: BackendStatus = BackendStatus(429);
    /// 500
    pub const INTERNAL_SERVER_ERROR: BackendStatus = BackendStatus(500);
    /// 502
    pub const BAD_GATEWAY: BackendStatus = BackendStatus(502);
    /// 503
    pub const SERVICE_UNAVAILABLE: BackendStatus = BackendStatus(503);
    /// 504
    pub const GATEWAY_TIMEOUT: BackendStatus = BackendStatus(504);

    /// Check if a failure with this code may succeed on retry
    ///
    /// Retryable: 408, 429, 500, 502, 503, 504. Everything else is permanent.
    pub fn is_retryable(&self) -> bool {
        matches!(self.0, 408 | 429 | 500 | 502 | 503 | 504)
    }
}

impl std::fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reply of one physical backend call
#[derive(Debug, Clone, PartialEq)]
pub struct BackendReply<T> {
    /// Status reported by the backend
    pub status: StoreStatus,
    /// Payload, if any
    pub value: Option<T>,
    /// Backend status code, if the backend reported one
    pub code: Option<BackendStatus>,
    /// Backend message
    pub message: Option<String>,
}

impl<T> BackendReply<T> {
    /// Successful reply carrying `value`
    pub fn success(value: T) -> Self {
        Self {
            status: StoreStatus::Success,
            value: Some(value),
            code: None,
            message: None,
        }
    }

    /// Warning reply, with or without a value
    pub fn warning(value: Option<T>, message: impl Into<String>) -> Self {
        Self {
            status: StoreStatus::Warning,
            value,
            code: None,
            message: Some(message.into()),
        }
    }

    /// Failure reply with a backend status code
    pub fn failure(code: BackendStatus, message: impl Into<String>) -> Self {
        Self {
            status: StoreStatus::Failure,
            value: None,
            code: Some(code),
            message: Some(message.into()),
        }
    }

    /// Check if this is a failure worth retrying
    ///
    /// Failures without a status code are treated as permanent.
    pub fn is_retryable_failure(&self) -> bool {
        self.status == StoreStatus::Failure && self.code.map_or(false, |c| c.is_retryable())
    }

    /// Map the payload, keeping status, code and message
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> BackendReply<U> {
        BackendReply {
            status: self.status,
            value: self.value.map(f),
            code: self.code,
            message: self.message,
        }
    }
}

/// Why an operation failed
#[derive(Debug, Clone, PartialEq)]
pub enum FailureKind {
    /// A key or destination name was malformed; no backend call was made
    Validation {
        /// What was wrong
        reason: String,
    },
    /// The admission filter rejected the record or the retrieved result
    Denied {
        /// Severity of the rejected record
        severity: SeverityLevel,
        /// Why it was rejected
        reason: String,
    },
    /// The backend reported a failure
    Backend {
        /// Backend status code
        code: Option<BackendStatus>,
        /// Backend message
        message: Option<String>,
        /// Whether the code is classified as transient
        retryable: bool,
    },
    /// A payload could not be encoded or decoded
    Serialization {
        /// Decoder or encoder message
        reason: String,
    },
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Validation { reason } => write!(f, "validation: {}", reason),
            FailureKind::Denied { severity, reason } => {
                write!(f, "denied {}: {}", severity, reason)
            }
            FailureKind::Backend {
                code,
                message,
                retryable,
            } => write!(
                f,
                "backend {} ({}): {}",
                code.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
                if *retryable { "transient" } else { "permanent" },
                message.as_deref().unwrap_or("")
            ),
            FailureKind::Serialization { reason } => write!(f, "serialization: {}", reason),
        }
    }
}

/// Diagnostic key/value context of an operation
///
/// Records what was attempted: table name, keys, container and blob name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseContext(BTreeMap<String, String>);

impl ResponseContext {
    /// Table name key
    pub const TABLE_NAME: &'static str = "table_name";
    /// Partition key key
    pub const PARTITION_KEY: &'static str = "partition_key";
    /// Row key key
    pub const ROW_KEY: &'static str = "row_key";
    /// Blob container key
    pub const BLOB_CONTAINER_NAME: &'static str = "blob_container_name";
    /// Blob name key
    pub const BLOB_NAME: &'static str = "blob_name";

    /// Empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Add an entry in place
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.0.insert(key.to_string(), value.into());
    }

    /// Look up an entry
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Iterate entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Outcome recorded on an executed operation
#[derive(Debug, Clone, PartialEq)]
pub struct StoreResponse {
    /// Final status
    pub status: StoreStatus,
    /// Record written or retrieved
    pub value: Option<LogRecord>,
    /// Failure cause when `status` is `Failure`
    pub failure: Option<FailureKind>,
    /// Backend message of the last reply
    pub message: Option<String>,
    /// What was attempted
    pub context: ResponseContext,
    /// Number of backend attempts made (0 when rejected before any call)
    pub attempts: u32,
}

impl StoreResponse {
    /// Build from the last backend reply of a retry loop, unmodified
    pub fn from_reply(
        reply: BackendReply<LogRecord>,
        attempts: u32,
        context: ResponseContext,
    ) -> Self {
        let failure = match reply.status {
            StoreStatus::Failure => Some(FailureKind::Backend {
                code: reply.code,
                message: reply.message.clone(),
                retryable: reply.is_retryable_failure(),
            }),
            _ => None,
        };
        Self {
            status: reply.status,
            value: reply.value,
            failure,
            message: reply.message,
            context,
            attempts,
        }
    }

    /// Admission filter rejection
    pub fn denied(
        severity: SeverityLevel,
        reason: impl Into<String>,
        context: ResponseContext,
        attempts: u32,
    ) -> Self {
        Self::failed(
            FailureKind::Denied {
                severity,
                reason: reason.into(),
            },
            context,
            attempts,
        )
    }

    /// Validation rejection before any backend call
    pub fn validation(reason: impl Into<String>, context: ResponseContext) -> Self {
        Self::failed(FailureKind::Validation { reason: reason.into() }, context, 0)
    }

    /// Payload encode/decode failure
    pub fn serialization(
        reason: impl Into<String>,
        context: ResponseContext,
        attempts: u32,
    ) -> Self {
        Self::failed(
            FailureKind::Serialization {
                reason: reason.into(),
            },
            context,
            attempts,
        )
    }

    fn failed(failure: FailureKind, context: ResponseContext, attempts: u32) -> Self {
        Self {
            status: StoreStatus::Failure,
            value: None,
            message: Some(failure.to_string()),
            failure: Some(failure),
            context,
            attempts,
        }
    }

    /// Check if the status is `Success`
    pub fn is_success(&self) -> bool {
        self.status == StoreStatus::Success
    }

    /// Check if the status is `Failure`
    pub fn is_failure(&self) -> bool {
        self.status == StoreStatus::Failure
    }

    /// Check if the admission filter rejected this operation
    pub fn is_denied(&self) -> bool {
        matches!(self.failure, Some(FailureKind::Denied { .. }))
    }
}
