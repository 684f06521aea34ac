//! Delivered-pin state machine shared by the email and mobile verifiers
//!
//! A pin is generated, hashed, delivered out of band, and stays valid for
//! a bounded window. Verification is bounded on both sides: a pin is dead
//! before its generation instant and from `valid_until` onwards. Success
//! consumes the pin immediately (hash cleared, validity collapsed to now)
//! so the same delivery can never verify twice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use am_shared::config::PinOtpConfig;

use crate::domain::entities::pin::{generate_pin, HashedPin};
use crate::domain::entities::throttle::ThrottleState;
use crate::errors::OtpError;

/// Time-boxed hashed-pin challenge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinChallenge {
    /// Hash of the outstanding pin; None when no pin is live
    pub pin: Option<HashedPin>,

    /// When the outstanding pin was generated; anchors the resend
    /// cooldown
    pub generated_at: Option<DateTime<Utc>>,

    /// Absolute expiry of the outstanding pin
    pub valid_until: Option<DateTime<Utc>>,

    /// Failure-backoff state
    pub throttle: ThrottleState,

    /// When a pin last verified successfully
    pub last_used_at: Option<DateTime<Utc>>,
}

impl PinChallenge {
    /// Fresh challenge with no outstanding pin
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a new pin, subject to the resend cooldown
    ///
    /// # Returns
    ///
    /// The plaintext pin for out-of-band delivery; only the hash is
    /// retained
    pub fn generate(
        &mut self,
        now: DateTime<Utc>,
        config: &PinOtpConfig,
    ) -> Result<String, OtpError> {
        if let Some(generated_at) = self.generated_at {
            let elapsed = (now - generated_at).num_seconds();
            if elapsed <= config.cooldown_secs {
                return Err(OtpError::CooldownActive {
                    retry_after: config.cooldown_secs - elapsed,
                });
            }
        }

        let plain = generate_pin(config.pin_length);
        self.pin = Some(HashedPin::new(&plain, config.hash_cost)?);
        self.generated_at = Some(now);
        self.valid_until = Some(now + chrono::Duration::seconds(config.validity_secs));
        Ok(plain)
    }

    /// Verifies a submitted pin
    ///
    /// Success clears the pin, collapses `valid_until` to now, resets the
    /// resend cooldown, and resets the throttle. A wrong, early, or
    /// expired pin increments the throttle and returns `Ok(false)`.
    pub fn verify(
        &mut self,
        candidate: &str,
        now: DateTime<Utc>,
        config: &PinOtpConfig,
    ) -> Result<bool, OtpError> {
        self.throttle
            .check(now, config.throttle_factor, config.throttle_enabled)?;

        if self.matches_live_pin(candidate, now) {
            self.pin = None;
            self.valid_until = Some(now);
            self.generated_at = None;
            self.last_used_at = Some(now);
            self.throttle.reset();
            return Ok(true);
        }

        self.throttle.record_failure(now);
        Ok(false)
    }

    /// Whether an unexpired pin is outstanding
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.pin.is_some()
            && self
                .valid_until
                .is_some_and(|until| now < until)
    }

    fn matches_live_pin(&self, candidate: &str, now: DateTime<Utc>) -> bool {
        let (Some(pin), Some(generated_at), Some(valid_until)) =
            (&self.pin, self.generated_at, self.valid_until)
        else {
            return false;
        };
        if now < generated_at || now >= valid_until {
            return false;
        }
        pin.matches(candidate)
    }
}
