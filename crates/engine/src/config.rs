//! Engine configuration
//!
//! Loadable from TOML. Every field has a default, so an empty document is a
//! valid configuration.
//!
//! ```toml
//! [retry]
//! max_attempts = 3
//! base_delay_ms = 1000
//! max_jitter_ms = 100
//! seed = 42
//!
//! [admission]
//! write_tier = "High"
//! read_tier = "Exception"
//! ```

use duallog_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::admission::{AdmissionFilter, SeverityTierFilter};
use crate::retry::{JitterSource, RetryPolicy, DEFAULT_MAX_ATTEMPTS};

/// Retry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts when an operation does not set its own limit
    pub max_attempts: u32,
    /// Backoff unit in milliseconds
    pub base_delay_ms: u64,
    /// Jitter bound in milliseconds
    pub max_jitter_ms: u64,
    /// Jitter seed; unset seeds from the OS
    pub seed: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: 1000,
            max_jitter_ms: 100,
            seed: None,
        }
    }
}

/// Admission settings; unset tiers allow everything
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Write gate
    pub write_tier: Option<SeverityTierFilter>,
    /// Read gate
    pub read_tier: Option<SeverityTierFilter>,
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Retry settings
    pub retry: RetryConfig,
    /// Admission settings
    pub admission: AdmissionConfig,
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(source).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Retry policy described by this configuration
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry.max_attempts)
            .with_base_delay(Duration::from_millis(self.retry.base_delay_ms))
            .with_max_jitter(Duration::from_millis(self.retry.max_jitter_ms))
    }

    /// Jitter generator, seeded when a seed is configured
    pub fn jitter_source(&self) -> JitterSource {
        match self.retry.seed {
            Some(seed) => JitterSource::seeded(seed),
            None => JitterSource::from_entropy(),
        }
    }

    /// Admission filter described by this configuration
    pub fn admission_filter(&self) -> AdmissionFilter {
        AdmissionFilter::new()
            .with_write_tier(self.admission.write_tier)
            .with_read_tier(self.admission.read_tier)
    }
}
