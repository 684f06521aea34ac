//! Multi-factor verification service module
//!
//! This module wraps the verifier family (TOTP, email OTP, mobile OTP,
//! backup codes, security code) with:
//! - Per-(verifier, user) serialization of verification attempts
//! - Persistence of every state change within the verify/generate call
//! - Step-up confirmation of refresh token chains
//! - Event publication after the state write

mod service;

#[cfg(test)]
mod tests;

pub use service::{
    MfaService, METHOD_AUTHENTICATOR, METHOD_BACKUP_CODE, METHOD_EMAIL, METHOD_MOBILE,
    METHOD_SECURITY_CODE,
};
