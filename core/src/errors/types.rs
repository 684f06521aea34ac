//! Error type definitions for token and verifier operations
//!
//! Kinds stay fully distinguishable inside the core for logging and tests.
//! At the service boundary they collapse into a small set of user-facing
//! messages via [`ErrorResponse`] so callers cannot tell a bad signature
//! from an expired or mis-audienced token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Token validation and issuance errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Malformed token")]
    Malformed,

    #[error("Token signature verification failed")]
    InvalidSignature,

    #[error("Signing algorithm not in the allow-list")]
    AlgorithmNotAllowed,

    #[error("Missing required claim: {claim}")]
    MissingClaim { claim: String },

    #[error("Invalid format for claim: {claim}")]
    InvalidClaimFormat { claim: String },

    #[error("Token has expired")]
    Expired,

    #[error("Token is not yet valid ({claim})")]
    Immature { claim: String },

    #[error("Claim value mismatch: {claim}")]
    Mismatch { claim: String },

    #[error("Token has been revoked")]
    Revoked,

    #[error("Token generation failed")]
    GenerationFailed,
}

/// One-time-credential verifier errors
///
/// A wrong code is *not* an error: verifiers return `Ok(false)` so callers
/// decide how to surface it. Errors cover the states where no verification
/// attempt is made at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OtpError {
    #[error("Too many failed attempts, retry in {retry_after} seconds")]
    Throttled { retry_after: i64 },

    #[error("Regeneration is cooling down, retry in {retry_after} seconds")]
    CooldownActive { retry_after: i64 },

    #[error("Credential hashing failed")]
    HashingFailed,
}

/// Unified error response structure for the service boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub error: String,

    /// Human-readable message, deliberately unspecific for token failures
    pub message: String,

    /// Seconds after which a retry may succeed, for throttle/cooldown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<i64>,

    /// Timestamp when the error occurred
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(error: impl ToString, message: impl ToString) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            retry_after: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach a retry-after hint
    pub fn with_retry_after(mut self, secs: i64) -> Self {
        self.retry_after = Some(secs);
        self
    }
}

/// Every token failure collapses to the same code and message so the
/// specific claim that failed never leaks to the caller
impl From<TokenError> for ErrorResponse {
    fn from(_: TokenError) -> Self {
        ErrorResponse::new("TOKEN_INVALID", "invalid or expired token")
    }
}

impl From<OtpError> for ErrorResponse {
    fn from(err: OtpError) -> Self {
        match err {
            OtpError::Throttled { retry_after } => {
                ErrorResponse::new("TOO_MANY_ATTEMPTS", "too many attempts")
                    .with_retry_after(retry_after)
            }
            OtpError::CooldownActive { retry_after } => {
                ErrorResponse::new("COOLDOWN_ACTIVE", "please wait before requesting a new code")
                    .with_retry_after(retry_after)
            }
            OtpError::HashingFailed => ErrorResponse::new("INTERNAL", "internal error"),
        }
    }
}
