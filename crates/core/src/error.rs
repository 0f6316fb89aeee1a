//! Error types for duallog
//!
//! Only programming-contract violations surface as [`Error`]. Expected
//! backend and admission outcomes are recorded in a
//! [`StoreResponse`](crate::StoreResponse) instead and never reach this type.

use thiserror::Error;

/// Contract and construction errors
#[derive(Debug, Error)]
pub enum Error {
    /// A required argument was empty
    #[error("missing required argument: {0}")]
    MissingArgument(&'static str),

    /// Retries were enabled with a non-positive attempt limit
    #[error("max_attempts must be positive when retries are enabled")]
    InvalidMaxAttempts,

    /// A response was assigned to an operation that already has one
    #[error("response already set for {0} operation")]
    ResponseAlreadySet(&'static str),

    /// A persisted record could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration could not be loaded
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The blocking executor could not start its runtime
    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Result type for duallog contract checks
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error signals caller misuse rather than an environment problem
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Error::MissingArgument(_) | Error::InvalidMaxAttempts | Error::ResponseAlreadySet(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Return `Err(MissingArgument)` when `value` is empty or whitespace.
pub(crate) fn require_non_empty(value: &str, name: &'static str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::MissingArgument(name))
    } else {
        Ok(())
    }
}
