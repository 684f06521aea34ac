//! Token codec and lifetime configuration

use serde::{Deserialize, Serialize};

/// Maps each semantic claim onto the JSON key used on the wire
///
/// Defaults follow the RFC 7519 registered names plus the platform's
/// custom claims. Every key can be remapped independently; the codec and
/// validator only ever address claims through this registry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClaimNames {
    /// Issuer claim key
    pub issuer: String,

    /// Subject claim key
    pub subject: String,

    /// Audience claim key
    pub audience: String,

    /// Expiration claim key
    pub expiration: String,

    /// Not-before claim key
    pub not_before: String,

    /// Issued-at claim key
    pub issued_at: String,

    /// JWT id claim key
    pub jwt_id: String,

    /// Token type claim key ("access"/"refresh")
    pub token_type: String,

    /// Multi-factor flag claim key
    pub multi_factor: String,

    /// Multi-factor expiry claim key
    pub multi_factor_expires: String,

    /// Multi-factor reference claim key (which verifier passed)
    pub multi_factor_ref: String,

    /// Session id claim key
    pub session_id: String,

    /// Refresh token id claim key
    pub refresh_token_id: String,

    /// Tenant id claim key
    pub tenant_id: String,

    /// Tenant owner claim key
    pub tenant_owner: String,

    /// Role-id list claim key
    pub role_ids: String,

    /// Platform type claim key
    pub platform_type: String,
}

impl Default for ClaimNames {
    fn default() -> Self {
        Self {
            issuer: "iss".to_string(),
            subject: "sub".to_string(),
            audience: "aud".to_string(),
            expiration: "exp".to_string(),
            not_before: "nbf".to_string(),
            issued_at: "iat".to_string(),
            jwt_id: "jti".to_string(),
            token_type: "tty".to_string(),
            multi_factor: "mfa".to_string(),
            multi_factor_expires: "mfe".to_string(),
            multi_factor_ref: "mfr".to_string(),
            session_id: "sid".to_string(),
            refresh_token_id: "rti".to_string(),
            tenant_id: "tni".to_string(),
            tenant_owner: "tno".to_string(),
            role_ids: "rri".to_string(),
            platform_type: "pft".to_string(),
        }
    }
}

impl ClaimNames {
    /// The claim keys whose values are epoch timestamps
    ///
    /// Used by the codec to normalize datetime-valued claims to integer
    /// seconds before signing.
    pub fn time_claims(&self) -> Vec<&str> {
        vec![
            self.expiration.as_str(),
            self.not_before.as_str(),
            self.issued_at.as_str(),
            self.multi_factor_expires.as_str(),
        ]
    }
}

/// Token codec and lifetime configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenConfig {
    /// Signing algorithm name ("HS256", "HS384", "HS512", "RS256", ...)
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Key used for signing (secret for HMAC, PEM for RSA/EC)
    pub signing_key: String,

    /// Key used for verification; None means the signing key doubles as
    /// the verifying key (symmetric algorithms)
    #[serde(default)]
    pub verifying_key: Option<String>,

    /// Issuer written into and expected from tokens
    #[serde(default)]
    pub issuer: Option<String>,

    /// Audience expected from tokens when none is supplied per call
    #[serde(default)]
    pub audience: Option<String>,

    /// Clock-skew tolerance in seconds applied to temporal claim checks
    #[serde(default)]
    pub leeway_secs: i64,

    /// Access token lifetime in seconds
    pub access_token_lifetime_secs: i64,

    /// Refresh token lifetime in seconds
    pub refresh_token_lifetime_secs: i64,

    /// Multi-factor session lifetime in seconds: how long a passed
    /// verification keeps a session pre-authorized
    pub multi_factor_session_lifetime_secs: i64,

    /// Claim-name registry
    #[serde(default)]
    pub claim_names: ClaimNames,

    /// Additional caller-defined claims treated as epoch timestamps
    #[serde(default)]
    pub extra_time_claims: Vec<String>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
            signing_key: String::from("development-secret-please-change-in-production"),
            verifying_key: None,
            issuer: Some(String::from("authmesh")),
            audience: None,
            leeway_secs: 0,
            access_token_lifetime_secs: 900,                 // 15 minutes
            refresh_token_lifetime_secs: 604_800,            // 7 days
            multi_factor_session_lifetime_secs: 1800,        // 30 minutes
            claim_names: ClaimNames::default(),
            extra_time_claims: Vec::new(),
        }
    }
}

impl TokenConfig {
    /// Create a new token configuration with a signing key
    pub fn new(signing_key: impl Into<String>) -> Self {
        Self {
            signing_key: signing_key.into(),
            ..Default::default()
        }
    }

    /// Set the access token lifetime in minutes
    pub fn with_access_lifetime_minutes(mut self, minutes: i64) -> Self {
        self.access_token_lifetime_secs = minutes * 60;
        self
    }

    /// Set the refresh token lifetime in days
    pub fn with_refresh_lifetime_days(mut self, days: i64) -> Self {
        self.refresh_token_lifetime_secs = days * 86_400;
        self
    }

    /// Check if using the default signing key (security warning)
    pub fn is_using_default_key(&self) -> bool {
        self.signing_key == "development-secret-please-change-in-production"
    }

    /// Create from environment variables
    pub fn from_env() -> Self {
        let signing_key = std::env::var("IDENTITY_SIGNING_KEY")
            .unwrap_or_else(|_| "development-secret-please-change-in-production".to_string());
        let algorithm =
            std::env::var("IDENTITY_ALGORITHM").unwrap_or_else(|_| default_algorithm());
        let access = env_i64("IDENTITY_ACCESS_TOKEN_LIFETIME", 900);
        let refresh = env_i64("IDENTITY_REFRESH_TOKEN_LIFETIME", 604_800);
        let mfa_session = env_i64("IDENTITY_MULTI_FACTOR_SESSION_LIFETIME", 1800);
        let leeway = env_i64("IDENTITY_LEEWAY", 0);

        Self {
            algorithm,
            signing_key,
            verifying_key: std::env::var("IDENTITY_VERIFYING_KEY").ok(),
            issuer: std::env::var("IDENTITY_ISSUER")
                .ok()
                .or_else(|| Some(String::from("authmesh"))),
            audience: std::env::var("IDENTITY_AUDIENCE").ok(),
            leeway_secs: leeway,
            access_token_lifetime_secs: access,
            refresh_token_lifetime_secs: refresh,
            multi_factor_session_lifetime_secs: mfa_session,
            claim_names: ClaimNames::default(),
            extra_time_claims: Vec::new(),
        }
    }
}

fn default_algorithm() -> String {
    String::from("HS256")
}

fn env_i64(key: &str, fallback: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}
