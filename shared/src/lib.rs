//! Shared configuration types for the AuthMesh identity platform
//!
//! This crate provides the immutable configuration surface consumed by the
//! core crate:
//! - Claim-name registry and token/codec defaults
//! - Per-verifier multi-factor tuning
//!
//! Configuration is built once at process start (`from_env` or `Default`)
//! and passed by reference afterwards; nothing here is resolved lazily.

pub mod config;

// Re-export commonly used items at crate root
pub use config::{
    BackupCodeConfig, ClaimNames, IdentityConfig, MfaConfig, OtpHashAlgorithm, PinOtpConfig,
    SecurityCodeConfig, TokenConfig, TotpConfig,
};
