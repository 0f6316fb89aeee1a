//! Severity levels and their storage tiers

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Severity of a log record
///
/// Levels are totally ordered:
/// `Info < Warning < Error < FatalError < Exception < FatalException`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SeverityLevel {
    /// Informational message
    Info,
    /// Something unexpected that did not stop the operation
    Warning,
    /// Recoverable error
    Error,
    /// Unrecoverable error
    FatalError,
    /// Captured exception
    Exception,
    /// Captured exception that terminated the operation
    FatalException,
}

/// Storage tier a severity is routed to by default naming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeverityTier {
    /// Info and Warning
    Low,
    /// Everything from Error upwards
    High,
}

impl SeverityLevel {
    /// All levels in ascending order
    pub const ALL: [SeverityLevel; 6] = [
        SeverityLevel::Info,
        SeverityLevel::Warning,
        SeverityLevel::Error,
        SeverityLevel::FatalError,
        SeverityLevel::Exception,
        SeverityLevel::FatalException,
    ];

    /// Stable name used in persisted records and blob paths
    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityLevel::Info => "Info",
            SeverityLevel::Warning => "Warning",
            SeverityLevel::Error => "Error",
            SeverityLevel::FatalError => "FatalError",
            SeverityLevel::Exception => "Exception",
            SeverityLevel::FatalException => "FatalException",
        }
    }

    /// Tier used for default table naming
    pub fn tier(&self) -> SeverityTier {
        match self {
            SeverityLevel::Info | SeverityLevel::Warning => SeverityTier::Low,
            _ => SeverityTier::High,
        }
    }
}

impl SeverityTier {
    /// Suffix appended to default table names
    pub fn suffix(&self) -> &'static str {
        match self {
            SeverityTier::Low => "Low",
            SeverityTier::High => "High",
        }
    }
}

impl std::fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeverityLevel {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SeverityLevel::ALL
            .iter()
            .copied()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| crate::Error::Serialization(format!("unknown severity level: {}", s)))
    }
}
