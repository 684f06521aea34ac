//! Email OTP verifier entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use am_shared::config::PinOtpConfig;

use crate::domain::entities::pin_challenge::PinChallenge;
use crate::errors::OtpError;

/// One-time pin delivered to a user's email address
///
/// Delivery itself is out of scope: `generate` returns the plaintext pin
/// and the surrounding system hands it to the mailer after the state
/// change is durable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailOtp {
    /// Unique identifier for this verifier
    pub id: Uuid,

    /// User this verifier belongs to
    pub user_id: String,

    /// Destination address
    pub email: String,

    /// Pin lifecycle and throttle state
    pub challenge: PinChallenge,
}

impl EmailOtp {
    /// Creates a verifier with no outstanding pin
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            email: email.into(),
            challenge: PinChallenge::new(),
        }
    }

    /// Generates a new pin for delivery, subject to the resend cooldown
    pub fn generate(
        &mut self,
        now: DateTime<Utc>,
        config: &PinOtpConfig,
    ) -> Result<String, OtpError> {
        self.challenge.generate(now, config)
    }

    /// Verifies a submitted pin
    pub fn verify(
        &mut self,
        pin: &str,
        now: DateTime<Utc>,
        config: &PinOtpConfig,
    ) -> Result<bool, OtpError> {
        self.challenge.verify(pin, now, config)
    }

    /// Whether an unexpired pin is outstanding
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.challenge.is_live(now)
    }
}
