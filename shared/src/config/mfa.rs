//! Multi-factor verifier configuration
//!
//! Each verifier type is tuned independently: digit length, validity
//! window, tolerance, throttle factor, and regeneration cooldown all have
//! their own knobs per verifier.

use serde::{Deserialize, Serialize};

/// Hash algorithm used for HMAC-based one-time passwords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OtpHashAlgorithm {
    Sha1,
    Sha256,
    Sha512,
}

impl Default for OtpHashAlgorithm {
    fn default() -> Self {
        // RFC 6238 default
        Self::Sha1
    }
}

/// TOTP verifier configuration (RFC 6238)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TotpConfig {
    /// Number of code digits (6-9)
    pub digits: u32,

    /// Time step in seconds
    pub period_secs: i64,

    /// Unix epoch offset the counter starts from
    #[serde(default)]
    pub t0: i64,

    /// HMAC hash algorithm
    #[serde(default)]
    pub algorithm: OtpHashAlgorithm,

    /// Accepted counter drift in steps on either side of the current one
    pub tolerance: i64,

    /// Whether failed attempts trigger exponential backoff
    #[serde(default = "default_true")]
    pub throttle_enabled: bool,

    /// Base of the exponential backoff in seconds
    pub throttle_factor: i64,

    /// Minimum interval between secret (re)generations in seconds
    pub setup_cooldown_secs: i64,

    /// Secret length in bytes
    pub secret_bytes: usize,
}

impl Default for TotpConfig {
    fn default() -> Self {
        Self {
            digits: 6,
            period_secs: 30,
            t0: 0,
            algorithm: OtpHashAlgorithm::Sha1,
            tolerance: 1,
            throttle_enabled: true,
            throttle_factor: 1,
            setup_cooldown_secs: 60,
            secret_bytes: 20,
        }
    }
}

/// Email/mobile OTP configuration
///
/// Both delivered-pin verifiers share this shape but carry separate
/// instances so they can be tuned independently.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PinOtpConfig {
    /// Number of pin digits
    pub pin_length: u32,

    /// How long a delivered pin stays valid, in seconds
    pub validity_secs: i64,

    /// Minimum interval between pin generations in seconds
    pub cooldown_secs: i64,

    /// Whether failed attempts trigger exponential backoff
    #[serde(default = "default_true")]
    pub throttle_enabled: bool,

    /// Base of the exponential backoff in seconds
    pub throttle_factor: i64,

    /// bcrypt cost used when hashing the pin
    #[serde(default = "default_bcrypt_cost")]
    pub hash_cost: u32,
}

impl Default for PinOtpConfig {
    fn default() -> Self {
        Self {
            pin_length: 6,
            validity_secs: 300, // 5 minutes
            cooldown_secs: 60,
            throttle_enabled: true,
            throttle_factor: 1,
            hash_cost: default_bcrypt_cost(),
        }
    }
}

/// Backup code configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackupCodeConfig {
    /// Number of codes generated per batch
    pub batch_size: usize,

    /// Random bytes per code (rendered as lowercase hex)
    pub code_bytes: usize,

    /// Hex characters per hyphen-separated group
    pub group_size: usize,

    /// Minimum interval between batch regenerations in seconds
    pub regenerate_cooldown_secs: i64,

    /// Whether failed attempts trigger exponential backoff
    #[serde(default = "default_true")]
    pub throttle_enabled: bool,

    /// Base of the exponential backoff in seconds
    pub throttle_factor: i64,
}

impl Default for BackupCodeConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            code_bytes: 6,
            group_size: 4,
            regenerate_cooldown_secs: 300,
            throttle_enabled: true,
            throttle_factor: 1,
        }
    }
}

/// Security code (persistent pin) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecurityCodeConfig {
    /// Whether failed attempts trigger exponential backoff
    #[serde(default = "default_true")]
    pub throttle_enabled: bool,

    /// Base of the exponential backoff in seconds
    pub throttle_factor: i64,

    /// bcrypt cost used when hashing the pin
    #[serde(default = "default_bcrypt_cost")]
    pub hash_cost: u32,
}

impl Default for SecurityCodeConfig {
    fn default() -> Self {
        Self {
            throttle_enabled: true,
            throttle_factor: 1,
            hash_cost: default_bcrypt_cost(),
        }
    }
}

/// Complete multi-factor configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MfaConfig {
    /// TOTP authenticator tuning
    #[serde(default)]
    pub totp: TotpConfig,

    /// Email OTP tuning
    #[serde(default)]
    pub email_otp: PinOtpConfig,

    /// Mobile OTP tuning
    #[serde(default)]
    pub mobile_otp: PinOtpConfig,

    /// Backup code tuning
    #[serde(default)]
    pub backup_codes: BackupCodeConfig,

    /// Security code tuning
    #[serde(default)]
    pub security_code: SecurityCodeConfig,
}

fn default_true() -> bool {
    true
}

fn default_bcrypt_cost() -> u32 {
    // Low-entropy short-lived pins do not warrant the default cost of 12,
    // which would dominate request latency
    8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totp_config_default() {
        let config = TotpConfig::default();
        assert_eq!(config.digits, 6);
        assert_eq!(config.period_secs, 30);
        assert_eq!(config.algorithm, OtpHashAlgorithm::Sha1);
        assert_eq!(config.tolerance, 1);
        assert!(config.throttle_enabled);
    }

    #[test]
    fn test_pin_otp_config_default() {
        let config = PinOtpConfig::default();
        assert_eq!(config.pin_length, 6);
        assert_eq!(config.validity_secs, 300);
        assert_eq!(config.cooldown_secs, 60);
    }

    #[test]
    fn test_backup_code_config_default() {
        let config = BackupCodeConfig::default();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.code_bytes, 6);
        assert_eq!(config.group_size, 4);
    }

    #[test]
    fn test_verifiers_tuned_independently() {
        let mut config = MfaConfig::default();
        config.email_otp.validity_secs = 600;
        config.mobile_otp.cooldown_secs = 30;

        assert_eq!(config.email_otp.validity_secs, 600);
        assert_eq!(config.mobile_otp.validity_secs, 300);
        assert_eq!(config.mobile_otp.cooldown_secs, 30);
    }
}
