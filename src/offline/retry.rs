//! # Retry Policy
//!
//! Decides when a queued mutation whose remote call failed may be attempted
//! again, and when it should stop being retried altogether.
//!
//! ## Strategies
//!
//! - **Immediate**: every drain retries every retained item, with no cap.
//! - **Exponential**: the item sits out drains until `base * 2^(attempts-1)`
//!   (capped at `max_delay`, plus jitter) has elapsed since its last failure;
//!   after `max_attempts` failures it is dead-lettered.
//!
//! ## Usage
//!
//! ```rust
//! use fieldsync::offline::retry::{RetryDecision, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::Exponential {
//!     base: Duration::from_secs(2),
//!     max_delay: Duration::from_secs(300),
//!     max_attempts: 8,
//!     jitter: 0.0,
//! };
//!
//! // Never attempted: always eligible
//! assert_eq!(policy.decide(None, 1_000), RetryDecision::Eligible);
//! assert_eq!(policy.backoff(3), Duration::from_secs(8));
//! ```

use crate::shared::config::ConfigError;
use crate::shared::mutation::AttemptState;
use std::time::Duration;

/// Backoff policy for failed queue items
#[derive(Debug, Clone, PartialEq)]
pub enum RetryPolicy {
    /// Retry on every drain, forever
    Immediate,
    /// Exponential backoff with jitter and an attempt cap
    Exponential {
        /// Delay after the first failure
        base: Duration,
        /// Upper bound for the delay
        max_delay: Duration,
        /// Failures tolerated before the item is dead-lettered
        max_attempts: u32,
        /// Jitter factor (0.0 to 1.0) added on top of the delay
        jitter: f64,
    },
}

/// What a drain should do with a retained item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Include the item in this drain's batch
    Eligible,
    /// Leave the item out of this batch; it stays queued
    Deferred {
        /// Epoch millis at which the item becomes eligible again
        until: i64,
    },
    /// The item has used up its attempts
    Exhausted,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(2),
            max_delay: Duration::from_secs(300), // 5 minutes
            max_attempts: 8,
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Validate the policy parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Immediate => Ok(()),
            Self::Exponential {
                base,
                max_delay,
                max_attempts,
                jitter,
            } => {
                if *max_attempts == 0 {
                    return Err(ConfigError::InvalidValue {
                        field: "retry.max_attempts",
                        message: "must be at least 1".to_string(),
                    });
                }
                if max_delay < base {
                    return Err(ConfigError::InvalidValue {
                        field: "retry.max_delay",
                        message: "must not be shorter than the base delay".to_string(),
                    });
                }
                if !(0.0..=1.0).contains(jitter) {
                    return Err(ConfigError::InvalidValue {
                        field: "retry.jitter",
                        message: format!("{} is outside 0.0..=1.0", jitter),
                    });
                }
                Ok(())
            }
        }
    }

    /// Delay before attempt number `attempts + 1`, without jitter
    pub fn backoff(&self, attempts: u32) -> Duration {
        match self {
            Self::Immediate => Duration::ZERO,
            Self::Exponential { base, max_delay, .. } => {
                if attempts == 0 {
                    return Duration::ZERO;
                }
                let factor = 2u32.saturating_pow(attempts.saturating_sub(1));
                base.saturating_mul(factor).min(*max_delay)
            }
        }
    }

    /// Backoff plus a random share of it, bounded by the jitter factor
    pub fn backoff_with_jitter(&self, attempts: u32) -> Duration {
        let delay = self.backoff(attempts);
        match self {
            Self::Exponential { jitter, .. } if *jitter > 0.0 && !delay.is_zero() => {
                let spread = delay.mul_f64(*jitter);
                let extra = rand::random::<f64>() * spread.as_secs_f64();
                delay + Duration::from_secs_f64(extra)
            }
            _ => delay,
        }
    }

    /// Epoch millis at which an item that has now failed `attempts` times
    /// becomes eligible again
    pub fn next_attempt_at(&self, attempts: u32, now_ms: i64) -> i64 {
        let delay = self.backoff_with_jitter(attempts);
        now_ms.saturating_add(i64::try_from(delay.as_millis()).unwrap_or(i64::MAX))
    }

    /// Whether a failure count has used up the policy's attempts
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        match self {
            Self::Immediate => false,
            Self::Exponential { max_attempts, .. } => attempts >= *max_attempts,
        }
    }

    /// Classify a retained item given its attempt bookkeeping
    pub fn decide(&self, state: Option<&AttemptState>, now_ms: i64) -> RetryDecision {
        let Some(state) = state else {
            return RetryDecision::Eligible;
        };
        if self.is_exhausted(state.attempts) {
            return RetryDecision::Exhausted;
        }
        match (self, state.next_attempt_at) {
            (Self::Immediate, _) | (_, None) => RetryDecision::Eligible,
            (_, Some(until)) if now_ms >= until => RetryDecision::Eligible,
            (_, Some(until)) => RetryDecision::Deferred { until },
        }
    }
}
