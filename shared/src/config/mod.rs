//! Configuration module with identity-specific sub-modules
//!
//! This module organizes configuration into logical areas:
//! - `token` - Claim names, signing keys, and token lifetimes
//! - `mfa` - Per-verifier tuning (TOTP, email/mobile OTP, backup codes,
//!   security code)

pub mod mfa;
pub mod token;

use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use mfa::{
    BackupCodeConfig, MfaConfig, OtpHashAlgorithm, PinOtpConfig, SecurityCodeConfig, TotpConfig,
};
pub use token::{ClaimNames, TokenConfig};

/// Complete identity-core configuration combining all sub-configurations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IdentityConfig {
    /// Token codec and lifetime configuration
    pub token: TokenConfig,

    /// Multi-factor verifier configuration
    #[serde(default)]
    pub mfa: MfaConfig,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            token: TokenConfig::default(),
            mfa: MfaConfig::default(),
        }
    }
}

impl IdentityConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset
    pub fn from_env() -> Self {
        Self {
            token: TokenConfig::from_env(),
            mfa: MfaConfig::default(),
        }
    }
}
