//! Security code verifier entity
//!
//! A single long-lived hashed pin. No expiry, no counter, no cooldown;
//! the only shared machinery is the failure throttle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use am_shared::config::SecurityCodeConfig;

use crate::domain::entities::pin::HashedPin;
use crate::domain::entities::throttle::ThrottleState;
use crate::errors::OtpError;

/// A user's persistent security pin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityCode {
    /// Unique identifier for this credential
    pub id: Uuid,

    /// User this credential belongs to
    pub user_id: String,

    /// Salted hash of the pin
    pub pin: HashedPin,

    /// When the pin was set
    pub created_at: DateTime<Utc>,

    /// Failure-backoff state
    pub throttle: ThrottleState,

    /// When the pin last verified successfully
    pub last_used_at: Option<DateTime<Utc>>,
}

impl SecurityCode {
    /// Creates a credential from a plaintext pin
    pub fn new(
        user_id: impl Into<String>,
        pin: &str,
        now: DateTime<Utc>,
        config: &SecurityCodeConfig,
    ) -> Result<Self, OtpError> {
        Ok(Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            pin: HashedPin::new(pin, config.hash_cost)?,
            created_at: now,
            throttle: ThrottleState::new(),
            last_used_at: None,
        })
    }

    /// Replaces the pin and clears failure state
    pub fn set_pin(
        &mut self,
        pin: &str,
        now: DateTime<Utc>,
        config: &SecurityCodeConfig,
    ) -> Result<(), OtpError> {
        self.pin = HashedPin::new(pin, config.hash_cost)?;
        self.created_at = now;
        self.throttle.reset();
        Ok(())
    }

    /// Verifies a submitted pin against the stored hash
    pub fn verify(
        &mut self,
        pin: &str,
        now: DateTime<Utc>,
        config: &SecurityCodeConfig,
    ) -> Result<bool, OtpError> {
        self.throttle
            .check(now, config.throttle_factor, config.throttle_enabled)?;

        if self.pin.matches(pin) {
            self.last_used_at = Some(now);
            self.throttle.reset();
            return Ok(true);
        }

        self.throttle.record_failure(now);
        Ok(false)
    }
}
