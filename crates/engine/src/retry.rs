//! Bounded retry with exponential backoff
//!
//! ## Backoff
//!
//! After attempt `k` (1-based) fails in a retryable way, the loop waits
//! `base_delay * 2^k` plus a uniform jitter in `[0, max_jitter)` before
//! attempt `k + 1`. No wait follows the final attempt.
//!
//! ## Stop conditions
//!
//! | Condition | Stops on |
//! |-----------|----------|
//! | [`StopCondition::Write`] | any non-failure, or a non-retryable failure |
//! | [`StopCondition::Read`] | success, warning with a value, or a non-retryable failure |
//! | [`StopCondition::EnsureExists`] | any non-failure, or a non-retryable failure |
//!
//! When attempts run out the last reply is returned unmodified.
//!
//! Waiting goes through a [`Sleeper`] and jitter through a seedable
//! [`JitterSource`], so tests observe exact delays without sleeping.

use async_trait::async_trait;
use duallog_core::{BackendReply, OperationOptions, StoreStatus};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default attempt limit
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default jitter bound
pub const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(100);

/// When a retry loop ends early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCondition {
    /// Insert and upload
    Write,
    /// Retrieve and download
    Read,
    /// Ensure-table and ensure-container
    EnsureExists,
}

impl StopCondition {
    /// Check if the loop should end after `reply`
    pub fn should_stop<T>(&self, reply: &BackendReply<T>) -> bool {
        let permanent_failure =
            reply.status == StoreStatus::Failure && !reply.is_retryable_failure();
        match self {
            StopCondition::Write | StopCondition::EnsureExists => {
                reply.status != StoreStatus::Failure || permanent_failure
            }
            StopCondition::Read => match reply.status {
                StoreStatus::Success => true,
                StoreStatus::Warning => reply.value.is_some(),
                StoreStatus::Failure => permanent_failure,
            },
        }
    }
}

/// Attempt limit and delay shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts when an operation does not set its own limit
    pub max_attempts: u32,
    /// Delay unit, doubled per attempt
    pub base_delay: Duration,
    /// Exclusive upper bound of the added jitter
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

impl RetryPolicy {
    /// Policy with the given attempt limit and default delays
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Policy that never waits
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }

    /// Set the delay unit
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Set the jitter bound
    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Attempts an operation gets: one without retries, else its own limit
    /// or this policy's
    pub fn effective_attempts(&self, options: &OperationOptions) -> u32 {
        if !options.retry_on_failures {
            return 1;
        }
        options.max_attempts.unwrap_or(self.max_attempts).max(1)
    }

    /// `base_delay * 2^attempt`, saturating
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Backoff plus a jitter sample
    pub fn delay_after(&self, attempt: u32, jitter: &JitterSource) -> Duration {
        self.backoff(attempt)
            .saturating_add(jitter.sample(self.max_jitter))
    }
}

/// Seedable uniform jitter generator
///
/// The lock is held only while drawing a sample.
#[derive(Debug)]
pub struct JitterSource {
    rng: Mutex<StdRng>,
}

impl JitterSource {
    /// Deterministic generator
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Generator seeded from the OS
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Uniform sample in `[0, max)`; zero when `max` is zero
    pub fn sample(&self, max: Duration) -> Duration {
        let bound = u64::try_from(max.as_nanos()).unwrap_or(u64::MAX);
        if bound == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.rng.lock().gen_range(0..bound))
    }
}

impl Default for JitterSource {
    fn default() -> Self {
        Self::from_entropy()
    }
}

// ============================================================================
// Sleepers
// ============================================================================

/// Waits between attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Wait for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records requested delays and returns immediately
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    /// Empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }

    /// Number of delays requested
    pub fn count(&self) -> usize {
        self.delays.lock().len()
    }

    /// Sum of requested delays
    pub fn total(&self) -> Duration {
        self.delays.lock().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().push(duration);
    }
}

// ============================================================================
// Retrier
// ============================================================================

/// How a retry loop ended
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome<T> {
    /// A stop condition held or attempts ran out
    Completed {
        /// Last reply received
        reply: BackendReply<T>,
        /// Attempts made
        attempts: u32,
    },
    /// The token fired; the in-flight attempt was abandoned
    Cancelled {
        /// Attempts started, including the abandoned one
        attempts: u32,
    },
}

/// Runs physical calls under a [`RetryPolicy`]
pub struct Retrier {
    policy: RetryPolicy,
    jitter: JitterSource,
    sleeper: Arc<dyn Sleeper>,
}

impl Retrier {
    /// Create a retrier
    pub fn new(policy: RetryPolicy, jitter: JitterSource, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            policy,
            jitter,
            sleeper,
        }
    }

    /// Active policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Call `call` until `stop` holds, `max_attempts` are spent, or `cancel` fires
    ///
    /// # Arguments
    ///
    /// * `stop` - stop condition checked after each reply
    /// * `max_attempts` - attempt limit, at least one attempt is made
    /// * `cancel` - abandons the current attempt or wait when triggered
    /// * `call_name` - label used in logs
    /// * `call` - issues one physical call
    pub async fn run<T, F, Fut>(
        &self,
        stop: StopCondition,
        max_attempts: u32,
        cancel: &CancellationToken,
        call_name: &str,
        mut call: F,
    ) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = BackendReply<T>>,
    {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            debug!(call = call_name, attempt, max_attempts, "backend attempt");

            let reply = tokio::select! {
                biased;
                _ = cancel.cancelled() => return RetryOutcome::Cancelled { attempts: attempt },
                reply = call() => reply,
            };

            if stop.should_stop(&reply) {
                return RetryOutcome::Completed {
                    reply,
                    attempts: attempt,
                };
            }
            if attempt >= max_attempts {
                warn!(
                    call = call_name,
                    attempts = attempt,
                    code = ?reply.code,
                    message = ?reply.message,
                    "retry attempts exhausted"
                );
                return RetryOutcome::Completed {
                    reply,
                    attempts: attempt,
                };
            }

            let delay = self.policy.delay_after(attempt, &self.jitter);
            warn!(
                call = call_name,
                attempt,
                status = ?reply.status,
                code = ?reply.code,
                delay_ms = delay.as_millis() as u64,
                "retryable backend reply, backing off"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return RetryOutcome::Cancelled { attempts: attempt },
                _ = self.sleeper.sleep(delay) => {}
            }
        }
    }
}

impl std::fmt::Debug for Retrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retrier")
            .field("policy", &self.policy)
            .finish()
    }
}
