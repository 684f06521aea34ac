//! TOTP authenticator entity (RFC 6238 on top of RFC 4226)
//!
//! The code for a counter value is `HMAC(secret, counter_be64)` run
//! through dynamic truncation and reduced modulo `10^digits`. Verification
//! walks the tolerance window around the current counter but never
//! accepts a counter at or below the last successfully verified one, so a
//! captured code cannot be replayed even inside its time step.

use chrono::{DateTime, Utc};
use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use uuid::Uuid;

use am_shared::config::{OtpHashAlgorithm, TotpConfig};

use crate::domain::entities::throttle::ThrottleState;
use crate::errors::OtpError;

/// Computes an RFC 4226 HMAC-based one-time password
///
/// Pure in `(secret, counter, algorithm, digits)`: identical inputs yield
/// identical codes.
pub fn hotp(secret: &[u8], counter: u64, algorithm: OtpHashAlgorithm, digits: u32) -> String {
    let message = counter.to_be_bytes();
    let digest = match algorithm {
        OtpHashAlgorithm::Sha1 => {
            let mut mac =
                Hmac::<Sha1>::new_from_slice(secret).expect("HMAC accepts any key length");
            mac.update(&message);
            mac.finalize().into_bytes().to_vec()
        }
        OtpHashAlgorithm::Sha256 => {
            let mut mac =
                Hmac::<Sha256>::new_from_slice(secret).expect("HMAC accepts any key length");
            mac.update(&message);
            mac.finalize().into_bytes().to_vec()
        }
        OtpHashAlgorithm::Sha512 => {
            let mut mac =
                Hmac::<Sha512>::new_from_slice(secret).expect("HMAC accepts any key length");
            mac.update(&message);
            mac.finalize().into_bytes().to_vec()
        }
    };

    // Dynamic truncation: low nibble of the last byte picks the offset,
    // four bytes from there are masked to 31 bits
    let offset = (digest[digest.len() - 1] & 0xf) as usize;
    let binary = ((u32::from(digest[offset]) & 0x7f) << 24)
        | (u32::from(digest[offset + 1]) << 16)
        | (u32::from(digest[offset + 2]) << 8)
        | u32::from(digest[offset + 3]);

    let code = binary % 10u32.pow(digits);
    format!("{:0width$}", code, width = digits as usize)
}

/// Time-based authenticator credential for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotpAuthenticator {
    /// Unique identifier for this credential
    pub id: Uuid,

    /// User this credential belongs to
    pub user_id: String,

    /// Shared secret; random bytes generated at enrollment
    pub secret: Vec<u8>,

    /// Highest counter value ever successfully verified
    pub last_t: i64,

    /// Whether the user has proven possession at least once
    pub confirmed: bool,

    /// When the current secret was generated; anchors the setup cooldown
    pub generated_at: DateTime<Utc>,

    /// When a code last verified successfully
    pub last_used_at: Option<DateTime<Utc>>,

    /// Failure-backoff state
    pub throttle: ThrottleState,
}

impl TotpAuthenticator {
    /// Creates a fresh authenticator with a random secret
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>, config: &TotpConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            secret: generate_secret(config.secret_bytes),
            last_t: 0,
            confirmed: false,
            generated_at: now,
            last_used_at: None,
            throttle: ThrottleState::new(),
        }
    }

    /// Replaces the secret, subject to the setup cooldown
    ///
    /// Resets counter, confirmation, and throttle state: the old
    /// credential is gone, not amended.
    pub fn regenerate(&mut self, now: DateTime<Utc>, config: &TotpConfig) -> Result<(), OtpError> {
        check_cooldown(self.generated_at, now, config.setup_cooldown_secs)?;
        self.secret = generate_secret(config.secret_bytes);
        self.last_t = 0;
        self.confirmed = false;
        self.generated_at = now;
        self.throttle.reset();
        Ok(())
    }

    /// The counter for a point in time
    pub fn counter_at(&self, at: DateTime<Utc>, config: &TotpConfig) -> i64 {
        (at.timestamp() - config.t0).div_euclid(config.period_secs)
    }

    /// The code for a point in time (enrollment display, tests)
    pub fn code_at(&self, at: DateTime<Utc>, config: &TotpConfig) -> String {
        let counter = self.counter_at(at, config);
        hotp(
            &self.secret,
            counter.max(0) as u64,
            config.algorithm,
            config.digits,
        )
    }

    /// Verifies a submitted code
    ///
    /// Accepts any counter within `tolerance` steps of the current one
    /// that is strictly greater than `last_t`. Success advances `last_t`
    /// to the matched counter, stamps `last_used_at`, and resets the
    /// throttle; a wrong code increments the throttle and returns
    /// `Ok(false)`.
    pub fn verify(
        &mut self,
        code: &str,
        now: DateTime<Utc>,
        config: &TotpConfig,
    ) -> Result<bool, OtpError> {
        self.throttle
            .check(now, config.throttle_factor, config.throttle_enabled)?;

        let current = self.counter_at(now, config);
        for t in (current - config.tolerance)..=(current + config.tolerance) {
            if t < 0 || t <= self.last_t {
                // Replay protection: counters at or below the last
                // verified one are dead even if numerically correct
                continue;
            }
            let candidate = hotp(&self.secret, t as u64, config.algorithm, config.digits);
            if constant_time_eq(candidate.as_bytes(), code.as_bytes()) {
                self.last_t = t;
                self.confirmed = true;
                self.last_used_at = Some(now);
                self.throttle.reset();
                return Ok(true);
            }
        }

        self.throttle.record_failure(now);
        Ok(false)
    }
}

fn generate_secret(bytes: usize) -> Vec<u8> {
    let mut secret = vec![0u8; bytes];
    OsRng.fill_bytes(&mut secret);
    secret
}

fn check_cooldown(
    generated_at: DateTime<Utc>,
    now: DateTime<Utc>,
    cooldown_secs: i64,
) -> Result<(), OtpError> {
    let elapsed = (now - generated_at).num_seconds();
    if elapsed <= cooldown_secs {
        return Err(OtpError::CooldownActive {
            retry_after: cooldown_secs - elapsed,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn config() -> TotpConfig {
        TotpConfig::default()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_hotp_rfc4226_vectors() {
        // Appendix D of RFC 4226: secret "12345678901234567890"
        let secret = b"12345678901234567890";
        let expected = [
            "755224", "287082", "359152", "969429", "338314", "254676", "287922", "162583",
            "399871", "520489",
        ];
        for (counter, want) in expected.iter().enumerate() {
            assert_eq!(
                hotp(secret, counter as u64, OtpHashAlgorithm::Sha1, 6),
                *want
            );
        }
    }

    #[test]
    fn test_hotp_is_deterministic() {
        let secret = b"some-secret";
        let a = hotp(secret, 42, OtpHashAlgorithm::Sha256, 8);
        let b = hotp(secret, 42, OtpHashAlgorithm::Sha256, 8);
        assert_eq!(a, b);

        // Changing any input changes the output
        assert_ne!(a, hotp(secret, 43, OtpHashAlgorithm::Sha256, 8));
        assert_ne!(a, hotp(b"other-secret", 42, OtpHashAlgorithm::Sha256, 8));
    }

    #[test]
    fn test_code_length_follows_digits() {
        let secret = b"some-secret";
        for digits in 6..=9 {
            let code = hotp(secret, 7, OtpHashAlgorithm::Sha1, digits);
            assert_eq!(code.len(), digits as usize);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_verify_accepts_current_code() {
        let mut device = TotpAuthenticator::new("user-1", at(0), &config());
        let code = device.code_at(at(0), &config());

        assert!(device.verify(&code, at(0), &config()).unwrap());
        assert!(device.confirmed);
        assert_eq!(device.last_used_at, Some(at(0)));
        assert_eq!(device.throttle.failure_count, 0);
    }

    #[test]
    fn test_verify_accepts_within_tolerance() {
        let mut device = TotpAuthenticator::new("user-1", at(0), &config());
        // Code from one step ago, clock drifted
        let stale = device.code_at(at(0) - Duration::seconds(30), &config());
        assert!(device.verify(&stale, at(0), &config()).unwrap());
    }

    #[test]
    fn test_verify_rejects_outside_tolerance() {
        let mut device = TotpAuthenticator::new("user-1", at(0), &config());
        let ancient = device.code_at(at(0) - Duration::seconds(120), &config());
        assert!(!device.verify(&ancient, at(0), &config()).unwrap());
        assert_eq!(device.throttle.failure_count, 1);
    }

    #[test]
    fn test_replay_rejected_after_success() {
        let mut device = TotpAuthenticator::new("user-1", at(0), &config());
        let code = device.code_at(at(0), &config());

        assert!(device.verify(&code, at(0), &config()).unwrap());
        let matched = device.last_t;

        // Wait out the throttle-free retry and replay the same code in
        // the same window: the counter is no longer above last_t
        assert!(!device.verify(&code, at(1), &config()).unwrap());
        assert_eq!(device.last_t, matched);
    }

    #[test]
    fn test_last_t_advances_monotonically() {
        let mut device = TotpAuthenticator::new("user-1", at(0), &config());

        let first = device.code_at(at(0), &config());
        assert!(device.verify(&first, at(0), &config()).unwrap());
        let t1 = device.last_t;

        let second = device.code_at(at(60), &config());
        assert!(device.verify(&second, at(60), &config()).unwrap());
        assert!(device.last_t > t1);
    }

    #[test]
    fn test_wrong_code_throttles() {
        let mut device = TotpAuthenticator::new("user-1", at(0), &config());

        assert!(!device.verify("000000", at(0), &config()).unwrap());
        let correct = device.code_at(at(0), &config());

        // Immediate retry is throttled, even with the correct code
        let err = device.verify(&correct, at(0), &config()).unwrap_err();
        assert!(matches!(err, OtpError::Throttled { retry_after: 1 }));

        // After the backoff the correct code goes through
        assert!(device.verify(&correct, at(1), &config()).unwrap());
    }

    #[test]
    fn test_regenerate_respects_cooldown() {
        let mut device = TotpAuthenticator::new("user-1", at(0), &config());
        let old_secret = device.secret.clone();

        let err = device.regenerate(at(30), &config()).unwrap_err();
        assert_eq!(err, OtpError::CooldownActive { retry_after: 30 });
        assert_eq!(device.secret, old_secret);

        assert!(device.regenerate(at(61), &config()).is_ok());
        assert_ne!(device.secret, old_secret);
        assert_eq!(device.last_t, 0);
        assert!(!device.confirmed);
    }

    #[test]
    fn test_sha256_and_sha512_variants() {
        let mut config = config();
        for algorithm in [OtpHashAlgorithm::Sha256, OtpHashAlgorithm::Sha512] {
            config.algorithm = algorithm;
            let mut device = TotpAuthenticator::new("user-1", at(0), &config);
            let code = device.code_at(at(0), &config);
            assert!(device.verify(&code, at(0), &config).unwrap());
        }
    }
}
