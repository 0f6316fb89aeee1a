//! Admission filters
//!
//! An [`AdmissionFilter`] holds two independent gates:
//! - the write gate sees the [`RawLogRecord`] before anything is derived
//! - the read gate sees the decoded [`LogRecord`] after a successful get
//!
//! Each gate is either absent (allow-all), a canonical
//! [`SeverityTierFilter`], or a caller-supplied predicate. Assigning a gate
//! replaces whatever was there before; gates never combine.

use duallog_core::{LogRecord, RawLogRecord, SeverityLevel};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Caller-supplied write predicate
pub type WritePredicate = Arc<dyn Fn(&RawLogRecord) -> bool + Send + Sync>;

/// Caller-supplied read predicate
pub type ReadPredicate = Arc<dyn Fn(&LogRecord) -> bool + Send + Sync>;

/// Canonical severity sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeverityTierFilter {
    /// `Info` only
    InfoOnly,
    /// `Info` and `Warning`
    Low,
    /// Everything from `Error` up
    High,
    /// `Error` and `FatalError`
    Error,
    /// `Exception` and `FatalException`
    Exception,
}

impl SeverityTierFilter {
    /// Check if `level` belongs to this set
    pub fn allows(&self, level: SeverityLevel) -> bool {
        use SeverityLevel::*;
        match self {
            SeverityTierFilter::InfoOnly => level == Info,
            SeverityTierFilter::Low => matches!(level, Info | Warning),
            SeverityTierFilter::High => {
                matches!(level, Error | FatalError | Exception | FatalException)
            }
            SeverityTierFilter::Error => matches!(level, Error | FatalError),
            SeverityTierFilter::Exception => matches!(level, Exception | FatalException),
        }
    }

    /// Stable name for diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityTierFilter::InfoOnly => "InfoOnly",
            SeverityTierFilter::Low => "Low",
            SeverityTierFilter::High => "High",
            SeverityTierFilter::Error => "Error",
            SeverityTierFilter::Exception => "Exception",
        }
    }
}

impl fmt::Display for SeverityTierFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict of a gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The record may pass
    Allowed,
    /// The record was rejected
    Denied {
        /// Human-readable rejection reason
        reason: String,
    },
}

impl Admission {
    /// Check if the record may pass
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

#[derive(Clone)]
enum Gate<P> {
    Tier(SeverityTierFilter),
    Custom(P),
}

impl<P> Gate<P> {
    fn check(
        &self,
        level: SeverityLevel,
        path: &str,
        custom: impl FnOnce(&P) -> bool,
    ) -> Admission {
        let (allowed, reason) = match self {
            Gate::Tier(tier) => (
                tier.allows(level),
                format!("{} filter {} rejects severity {}", path, tier, level),
            ),
            Gate::Custom(predicate) => (
                custom(predicate),
                format!("{} predicate rejected severity {}", path, level),
            ),
        };
        if allowed {
            Admission::Allowed
        } else {
            Admission::Denied { reason }
        }
    }

    fn describe(&self) -> String {
        match self {
            Gate::Tier(tier) => tier.to_string(),
            Gate::Custom(_) => "custom".to_string(),
        }
    }
}

/// Write and read admission gates
///
/// # Example
///
/// ```ignore
/// let filter = AdmissionFilter::new()
///     .with_write_tier(Some(SeverityTierFilter::High))
///     .with_read_tier(None);
/// assert!(!filter.is_write_allowed(&RawLogRecord::new("api", SeverityLevel::Info)));
/// ```
#[derive(Clone, Default)]
pub struct AdmissionFilter {
    write: Option<Gate<WritePredicate>>,
    read: Option<Gate<ReadPredicate>>,
}

impl AdmissionFilter {
    /// Allow-all filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate writes on a canonical tier; `None` reverts to allow-all
    pub fn with_write_tier(mut self, tier: Option<SeverityTierFilter>) -> Self {
        self.write = tier.map(Gate::Tier);
        self
    }

    /// Gate reads on a canonical tier; `None` reverts to allow-all
    pub fn with_read_tier(mut self, tier: Option<SeverityTierFilter>) -> Self {
        self.read = tier.map(Gate::Tier);
        self
    }

    /// Gate writes on a custom predicate; `None` reverts to allow-all
    pub fn with_write_predicate(mut self, predicate: Option<WritePredicate>) -> Self {
        self.write = predicate.map(Gate::Custom);
        self
    }

    /// Gate reads on a custom predicate; `None` reverts to allow-all
    pub fn with_read_predicate(mut self, predicate: Option<ReadPredicate>) -> Self {
        self.read = predicate.map(Gate::Custom);
        self
    }

    /// Verdict for writing `record`
    pub fn check_write(&self, record: &RawLogRecord) -> Admission {
        match &self.write {
            None => Admission::Allowed,
            Some(gate) => gate.check(record.severity_level, "write", |p| p(record)),
        }
    }

    /// Verdict for returning `record` from a read
    pub fn check_read(&self, record: &LogRecord) -> Admission {
        match &self.read {
            None => Admission::Allowed,
            Some(gate) => gate.check(record.severity_level, "read", |p| p(record)),
        }
    }

    /// Check if `record` may be written
    pub fn is_write_allowed(&self, record: &RawLogRecord) -> bool {
        self.check_write(record).is_allowed()
    }

    /// Check if `record` may be returned from a read
    pub fn is_read_allowed(&self, record: &LogRecord) -> bool {
        self.check_read(record).is_allowed()
    }
}

impl fmt::Debug for AdmissionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let describe = |gate: Option<String>| gate.unwrap_or_else(|| "allow-all".to_string());
        f.debug_struct("AdmissionFilter")
            .field("write", &describe(self.write.as_ref().map(Gate::describe)))
            .field("read", &describe(self.read.as_ref().map(Gate::describe)))
            .finish()
    }
}
