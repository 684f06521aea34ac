//! Exponential-backoff throttle state shared by every verifier
//!
//! After `n` consecutive failures an attempt is only admitted once
//! `factor * 2^(n-1)` seconds have passed since the last failure. A
//! throttled rejection does not count as an attempt: failure state is
//! untouched so the required delay cannot grow while the caller is being
//! held off.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::OtpError;

/// Failure-backoff sub-state embedded in each verifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleState {
    /// Consecutive failed attempts since the last success
    pub failure_count: u32,

    /// When the most recent failure happened
    pub failure_timestamp: Option<DateTime<Utc>>,
}

impl ThrottleState {
    /// Fresh, unthrottled state
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits or rejects an attempt before any verification work runs
    ///
    /// # Arguments
    ///
    /// * `now` - The caller's clock
    /// * `factor` - Backoff base in seconds
    /// * `enabled` - Whether throttling applies at all
    ///
    /// # Returns
    ///
    /// `Ok(())` if the attempt may proceed, `Err(OtpError::Throttled)`
    /// with the remaining delay otherwise
    pub fn check(&self, now: DateTime<Utc>, factor: i64, enabled: bool) -> Result<(), OtpError> {
        if !enabled || self.failure_count == 0 {
            return Ok(());
        }
        let Some(last_failure) = self.failure_timestamp else {
            return Ok(());
        };

        let required = required_delay(factor, self.failure_count);
        let elapsed = (now - last_failure).num_seconds();
        if elapsed < required {
            return Err(OtpError::Throttled {
                retry_after: required - elapsed,
            });
        }
        Ok(())
    }

    /// Records a failed attempt
    pub fn record_failure(&mut self, now: DateTime<Utc>) {
        self.failure_count += 1;
        self.failure_timestamp = Some(now);
    }

    /// Clears all failure state after a success
    pub fn reset(&mut self) {
        self.failure_count = 0;
        self.failure_timestamp = None;
    }
}

/// `factor * 2^(n-1)` seconds, saturating so absurd failure counts cannot
/// overflow into an instantly-admitted attempt
fn required_delay(factor: i64, failure_count: u32) -> i64 {
    let exponent = failure_count.saturating_sub(1).min(62);
    factor.saturating_mul(1i64 << exponent)
}
