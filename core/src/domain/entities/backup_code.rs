//! Backup code verifier entity
//!
//! A fixed-size batch of single-use random codes generated together.
//! Codes never expire and there is no counter; the only state advance is
//! the append-only used set. Only code digests are stored.

use chrono::{DateTime, Utc};
use constant_time_eq::constant_time_eq;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use am_shared::config::BackupCodeConfig;

use crate::domain::entities::throttle::ThrottleState;
use crate::errors::OtpError;

/// A user's current batch of backup codes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupCodeSet {
    /// Unique identifier for this batch
    pub id: Uuid,

    /// User this batch belongs to
    pub user_id: String,

    /// SHA-256 digests of every code in the batch
    pub code_hashes: Vec<String>,

    /// Digests of codes that have been spent; append-only
    pub used_hashes: Vec<String>,

    /// When the batch was generated; anchors the regeneration cooldown
    pub generated_at: DateTime<Utc>,

    /// Failure-backoff state
    pub throttle: ThrottleState,

    /// When a code was last spent
    pub last_used_at: Option<DateTime<Utc>>,
}

impl BackupCodeSet {
    /// Generates a fresh batch
    ///
    /// # Returns
    ///
    /// The entity plus the plaintext codes, which exist only in this
    /// return value
    pub fn generate(
        user_id: impl Into<String>,
        now: DateTime<Utc>,
        config: &BackupCodeConfig,
    ) -> (Self, Vec<String>) {
        let codes: Vec<String> = (0..config.batch_size)
            .map(|_| generate_code(config.code_bytes, config.group_size))
            .collect();
        let set = Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            code_hashes: codes.iter().map(|code| digest(code)).collect(),
            used_hashes: Vec::new(),
            generated_at: now,
            throttle: ThrottleState::new(),
            last_used_at: None,
        };
        (set, codes)
    }

    /// Replaces the batch, subject to the regeneration cooldown
    ///
    /// The used set is cleared along with the codes: spent entries only
    /// guard codes from the batch they were spent against.
    pub fn regenerate(
        &mut self,
        now: DateTime<Utc>,
        config: &BackupCodeConfig,
    ) -> Result<Vec<String>, OtpError> {
        let elapsed = (now - self.generated_at).num_seconds();
        if elapsed <= config.regenerate_cooldown_secs {
            return Err(OtpError::CooldownActive {
                retry_after: config.regenerate_cooldown_secs - elapsed,
            });
        }

        let codes: Vec<String> = (0..config.batch_size)
            .map(|_| generate_code(config.code_bytes, config.group_size))
            .collect();
        self.code_hashes = codes.iter().map(|code| digest(code)).collect();
        self.used_hashes.clear();
        self.generated_at = now;
        self.throttle.reset();
        Ok(codes)
    }

    /// Verifies a submitted code
    ///
    /// Succeeds only if the code belongs to the batch and has not been
    /// spent; success appends it to the used set permanently.
    pub fn verify(
        &mut self,
        code: &str,
        now: DateTime<Utc>,
        config: &BackupCodeConfig,
    ) -> Result<bool, OtpError> {
        self.throttle
            .check(now, config.throttle_factor, config.throttle_enabled)?;

        let candidate = digest(code);
        let known = self
            .code_hashes
            .iter()
            .any(|hash| constant_time_eq(hash.as_bytes(), candidate.as_bytes()));
        let spent = self.used_hashes.iter().any(|hash| hash == &candidate);

        if known && !spent {
            self.used_hashes.push(candidate);
            self.last_used_at = Some(now);
            self.throttle.reset();
            return Ok(true);
        }

        self.throttle.record_failure(now);
        Ok(false)
    }

    /// How many codes remain unspent
    pub fn remaining(&self) -> usize {
        self.code_hashes.len() - self.used_hashes.len()
    }
}

fn digest(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Random lowercase-hex code in hyphen-separated groups
/// (e.g. `a1b2-c3d4-e5f6` for 6 bytes grouped by 4)
fn generate_code(code_bytes: usize, group_size: usize) -> String {
    let mut bytes = vec![0u8; code_bytes];
    OsRng.fill_bytes(&mut bytes);
    let raw = hex::encode(bytes);

    raw.as_bytes()
        .chunks(group_size.max(1))
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BackupCodeConfig {
        BackupCodeConfig::default()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_batch_shape() {
        let (set, codes) = BackupCodeSet::generate("user-1", at(0), &config());

        assert_eq!(codes.len(), 10);
        assert_eq!(set.code_hashes.len(), 10);
        assert_eq!(set.remaining(), 10);
        for code in &codes {
            // 12 hex chars in groups of 4: xxxx-xxxx-xxxx
            assert_eq!(code.len(), 14);
            assert_eq!(code.matches('-').count(), 2);
        }
    }

    #[test]
    fn test_each_code_verifies_exactly_once() {
        let (mut set, codes) = BackupCodeSet::generate("user-1", at(0), &config());

        for (i, code) in codes.iter().enumerate() {
            // Space attempts out so the throttle never interferes
            let now = at((i as i64) * 1000);
            assert!(set.verify(code, now, &config()).unwrap());
            assert!(!set.verify(code, now + chrono::Duration::seconds(1), &config()).unwrap());
            // The spent code still sits in the full code list
            assert_eq!(set.code_hashes.len(), 10);
        }
        assert_eq!(set.remaining(), 0);
    }

    #[test]
    fn test_used_set_is_append_only() {
        let (mut set, codes) = BackupCodeSet::generate("user-1", at(0), &config());

        assert!(set.verify(&codes[0], at(0), &config()).unwrap());
        assert_eq!(set.used_hashes.len(), 1);

        assert!(set.verify(&codes[1], at(10), &config()).unwrap());
        assert_eq!(set.used_hashes.len(), 2);
        assert!(set.used_hashes.contains(&set.used_hashes[0].clone()));
    }

    #[test]
    fn test_unknown_code_throttles() {
        let (mut set, codes) = BackupCodeSet::generate("user-1", at(0), &config());

        assert!(!set.verify("zzzz-zzzz-zzzz", at(0), &config()).unwrap());
        let err = set.verify(&codes[0], at(0), &config()).unwrap_err();
        assert!(matches!(err, OtpError::Throttled { .. }));

        assert!(set.verify(&codes[0], at(2), &config()).unwrap());
    }

    #[test]
    fn test_regenerate_respects_cooldown() {
        let (mut set, old_codes) = BackupCodeSet::generate("user-1", at(0), &config());

        let err = set.regenerate(at(100), &config()).unwrap_err();
        assert_eq!(err, OtpError::CooldownActive { retry_after: 200 });

        let new_codes = set.regenerate(at(301), &config()).unwrap();
        assert_eq!(new_codes.len(), 10);
        assert!(set.used_hashes.is_empty());

        // Codes from the old batch are gone
        assert!(!set.verify(&old_codes[0], at(302), &config()).unwrap());
    }

    #[test]
    fn test_codes_are_unique_within_batch() {
        let (_, codes) = BackupCodeSet::generate("user-1", at(0), &config());
        let unique: std::collections::HashSet<&String> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }
}
