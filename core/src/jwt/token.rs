//! Typed access/refresh token view over a claim set
//!
//! One parametrized type covers both token kinds; the kind and its
//! lifetime are data, not subclasses. Fresh tokens are issued through
//! [`TokenCodec::issue`](super::codec::TokenCodec::issue) and encoded
//! strings re-enter through
//! [`TokenCodec::parse`](super::codec::TokenCodec::parse), which checks
//! the token-type claim against the requested kind.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use uuid::Uuid;

use am_shared::config::ClaimNames;

use crate::errors::TokenError;
use crate::jwt::claims::ClaimSet;

/// The two token kinds issued by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Short-lived token presented on every request
    Access,
    /// Long-lived token exchanged for fresh access tokens
    Refresh,
}

impl TokenKind {
    /// Wire value of the token-type claim
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// A claim map with named, typed accessors
///
/// Transient: derived from a refresh-token record or decoded from the
/// wire, never stored. Mandatory claims surface as `Result`, optional
/// claims as `Option`.
#[derive(Debug, Clone)]
pub struct SessionToken {
    kind: TokenKind,
    claims: ClaimSet,
    names: ClaimNames,
}

impl SessionToken {
    /// Wraps a claim set as a token of the given kind
    ///
    /// The token-type claim is (re)written to match `kind`.
    pub fn from_claims(kind: TokenKind, mut claims: ClaimSet, names: ClaimNames) -> Self {
        claims.insert(names.token_type.clone(), Value::from(kind.as_str()));
        Self {
            kind,
            claims,
            names,
        }
    }

    /// The token kind
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// The underlying claim set
    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }

    // Mandatory claim accessors

    /// Issuer claim
    pub fn issuer(&self) -> Result<&str, TokenError> {
        self.require_str(&self.names.issuer)
    }

    /// Subject claim
    pub fn subject(&self) -> Result<&str, TokenError> {
        self.require_str(&self.names.subject)
    }

    /// Expiration as a UTC datetime
    pub fn expiration(&self) -> Result<DateTime<Utc>, TokenError> {
        self.require_datetime(&self.names.expiration)
    }

    /// JWT id claim
    pub fn jwt_id(&self) -> Result<&str, TokenError> {
        self.require_str(&self.names.jwt_id)
    }

    /// Token-type claim
    pub fn token_type(&self) -> Result<&str, TokenError> {
        self.require_str(&self.names.token_type)
    }

    // Optional claim accessors

    /// Audience claim, when present and string-valued
    pub fn audience(&self) -> Option<&str> {
        self.claims.get_str(&self.names.audience)
    }

    /// Not-before as a UTC datetime
    pub fn not_before(&self) -> Option<DateTime<Utc>> {
        self.claims.get_datetime(&self.names.not_before)
    }

    /// Issued-at as a UTC datetime
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.claims.get_datetime(&self.names.issued_at)
    }

    /// Whether step-up verification has passed; absent reads as false
    pub fn multi_factor(&self) -> bool {
        self.claims
            .get_bool(&self.names.multi_factor)
            .unwrap_or(false)
    }

    /// When the passed verification lapses
    pub fn multi_factor_expires(&self) -> Option<DateTime<Utc>> {
        self.claims.get_datetime(&self.names.multi_factor_expires)
    }

    /// Which verifier passed ("authenticator", "email", ...)
    pub fn multi_factor_ref(&self) -> Option<&str> {
        self.claims.get_str(&self.names.multi_factor_ref)
    }

    /// Session id claim
    pub fn session_id(&self) -> Option<&str> {
        self.claims.get_str(&self.names.session_id)
    }

    /// Refresh-token id claim
    pub fn refresh_token_id(&self) -> Option<&str> {
        self.claims.get_str(&self.names.refresh_token_id)
    }

    /// Tenant id claim
    pub fn tenant_id(&self) -> Option<&str> {
        self.claims.get_str(&self.names.tenant_id)
    }

    /// Tenant owner claim
    pub fn tenant_owner(&self) -> Option<&str> {
        self.claims.get_str(&self.names.tenant_owner)
    }

    /// Role-id list claim
    pub fn role_ids(&self) -> Option<Vec<i64>> {
        match self.claims.get(&self.names.role_ids)? {
            Value::Array(items) => items.iter().map(Value::as_i64).collect(),
            _ => None,
        }
    }

    /// Platform type claim ("mobile", "desktop", "web", "other")
    pub fn platform_type(&self) -> Option<&str> {
        self.claims.get_str(&self.names.platform_type)
    }

    // Mutators

    /// Writes the expiration claim as `from + lifetime`
    pub fn set_expiration(&mut self, from: DateTime<Utc>, lifetime: Duration) {
        self.claims
            .insert_datetime(self.names.expiration.clone(), from + lifetime);
    }

    /// Writes the issued-at claim
    pub fn set_issued_at(&mut self, at: DateTime<Utc>) {
        self.claims
            .insert_datetime(self.names.issued_at.clone(), at);
    }

    /// Writes the multi-factor expiry claim as `from + lifetime`
    pub fn set_multi_factor_expiration(&mut self, from: DateTime<Utc>, lifetime: Duration) {
        self.claims
            .insert_datetime(self.names.multi_factor_expires.clone(), from + lifetime);
    }

    /// Writes the multi-factor flag and reference
    pub fn set_multi_factor(&mut self, verified: bool, reference: Option<&str>) {
        self.claims
            .insert(self.names.multi_factor.clone(), Value::from(verified));
        if let Some(reference) = reference {
            self.claims
                .insert(self.names.multi_factor_ref.clone(), Value::from(reference));
        }
    }

    /// Replaces the JWT id with a fresh unique value
    pub fn regenerate_jwt_id(&mut self) {
        self.claims.insert(
            self.names.jwt_id.clone(),
            Value::from(Uuid::new_v4().to_string()),
        );
    }

    /// Write an arbitrary claim
    pub fn set_claim(&mut self, key: impl Into<String>, value: Value) {
        self.claims.insert(key, value);
    }

    fn require_str(&self, claim: &str) -> Result<&str, TokenError> {
        self.claims
            .get_str(claim)
            .ok_or_else(|| TokenError::MissingClaim {
                claim: claim.to_string(),
            })
    }

    fn require_datetime(&self, claim: &str) -> Result<DateTime<Utc>, TokenError> {
        self.claims
            .get_datetime(claim)
            .ok_or_else(|| TokenError::MissingClaim {
                claim: claim.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn token() -> SessionToken {
        let mut claims = ClaimSet::new();
        claims.insert("iss", json!("authmesh"));
        claims.insert("sub", json!("user-1"));
        claims.insert("aud", json!("platform-7"));
        claims.insert("exp", json!(1_700_000_900));
        claims.insert("iat", json!(1_700_000_000));
        claims.insert("jti", json!("jti-1"));
        claims.insert("mfa", json!(true));
        claims.insert("mfr", json!("authenticator"));
        claims.insert("sid", json!("session-1"));
        claims.insert("rti", json!("token-1"));
        claims.insert("rri", json!([3, 5]));
        SessionToken::from_claims(TokenKind::Access, claims, ClaimNames::default())
    }

    #[test]
    fn test_kind_writes_token_type_claim() {
        let token = token();
        assert_eq!(token.token_type().unwrap(), "access");
        assert_eq!(token.kind(), TokenKind::Access);
    }

    #[test]
    fn test_mandatory_accessors() {
        let token = token();
        assert_eq!(token.subject().unwrap(), "user-1");
        assert_eq!(token.issuer().unwrap(), "authmesh");
        assert_eq!(token.jwt_id().unwrap(), "jti-1");
        assert_eq!(token.expiration().unwrap().timestamp(), 1_700_000_900);
    }

    #[test]
    fn test_missing_mandatory_claim_is_typed_error() {
        let empty =
            SessionToken::from_claims(TokenKind::Access, ClaimSet::new(), ClaimNames::default());
        let err = empty.subject().unwrap_err();
        assert_eq!(
            err,
            TokenError::MissingClaim {
                claim: "sub".to_string()
            }
        );
    }

    #[test]
    fn test_optional_accessors() {
        let token = token();
        assert_eq!(token.audience(), Some("platform-7"));
        assert_eq!(token.not_before(), None);
        assert!(token.multi_factor());
        assert_eq!(token.multi_factor_ref(), Some("authenticator"));
        assert_eq!(token.session_id(), Some("session-1"));
        assert_eq!(token.refresh_token_id(), Some("token-1"));
        assert_eq!(token.role_ids(), Some(vec![3, 5]));
    }

    #[test]
    fn test_absent_mfa_reads_false() {
        let empty =
            SessionToken::from_claims(TokenKind::Access, ClaimSet::new(), ClaimNames::default());
        assert!(!empty.multi_factor());
    }

    #[test]
    fn test_set_expiration_writes_epoch() {
        let mut token = token();
        let from = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        token.set_expiration(from, Duration::seconds(600));
        assert_eq!(token.claims().get_i64("exp"), Some(1_700_000_600));
    }

    #[test]
    fn test_set_multi_factor_expiration() {
        let mut token = token();
        let from = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        token.set_multi_factor_expiration(from, Duration::seconds(1800));
        assert_eq!(token.claims().get_i64("mfe"), Some(1_700_001_800));
    }

    #[test]
    fn test_regenerate_jwt_id_changes_value() {
        let mut token = token();
        token.regenerate_jwt_id();
        let first = token.jwt_id().unwrap().to_string();
        token.regenerate_jwt_id();
        assert_ne!(first, token.jwt_id().unwrap());
    }
}
