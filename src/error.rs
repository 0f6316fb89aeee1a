//! Unified error type for duallog
//!
//! Wraps the contract errors raised by the internal crates. Backend,
//! admission and validation outcomes are never errors; they are recorded on
//! the operation's [`StoreResponse`](crate::StoreResponse).

use thiserror::Error;

/// All duallog errors
#[derive(Debug, Error)]
pub enum Error {
    /// A required argument was empty or a required store was not configured
    #[error("missing required argument: {0}")]
    MissingArgument(String),

    /// Retries were enabled with a zero attempt limit
    #[error("max_attempts must be positive when retries are enabled")]
    InvalidMaxAttempts,

    /// A response was assigned twice, usually by executing a sequence twice
    #[error("response already set for {0} operation")]
    ResponseAlreadySet(String),

    /// A container held a different operation kind than requested
    #[error("category mismatch: {0}")]
    CategoryMismatch(String),

    /// A record could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration could not be loaded or is invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// The blocking executor could not start its runtime
    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Result type for duallog operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error signals caller misuse
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Error::MissingArgument(_)
                | Error::InvalidMaxAttempts
                | Error::ResponseAlreadySet(_)
                | Error::CategoryMismatch(_)
        )
    }

    /// Check if this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

// Convert from internal core errors
impl From<duallog_core::Error> for Error {
    fn from(e: duallog_core::Error) -> Self {
        use duallog_core::Error as CoreError;
        match e {
            CoreError::MissingArgument(name) => Error::MissingArgument(name.to_string()),
            CoreError::InvalidMaxAttempts => Error::InvalidMaxAttempts,
            CoreError::ResponseAlreadySet(kind) => Error::ResponseAlreadySet(kind.to_string()),
            CoreError::Serialization(msg) => Error::Serialization(msg),
            CoreError::Config(msg) => Error::Config(msg),
            CoreError::Runtime(msg) => Error::Runtime(msg),
        }
    }
}

impl From<duallog_core::CategoryMismatch> for Error {
    fn from(e: duallog_core::CategoryMismatch) -> Self {
        Error::CategoryMismatch(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
