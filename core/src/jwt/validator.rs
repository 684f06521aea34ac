//! Pure claim-set validation
//!
//! Decides whether a decoded claim set satisfies the temporal and
//! identity rules. Every per-claim check is independently toggleable and
//! the validator has no side effects: it sees only the claims, the
//! options, the expected values, and the caller's clock.

use chrono::{DateTime, Utc};
use serde_json::Value;

use am_shared::config::ClaimNames;

use crate::errors::TokenError;
use crate::jwt::claims::ClaimSet;

/// Which claim checks run during validation
///
/// `Default` enables everything (the posture for verified tokens).
/// [`ValidationOptions::insecure`] disables everything, mirroring the
/// contract that disabling signature verification also disables all claim
/// checks unless the caller explicitly re-enables them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Verify the token signature (consumed by the codec, not here)
    pub verify_signature: bool,

    /// Check `exp` (mandatory claim)
    pub verify_exp: bool,

    /// Check `nbf` when present
    pub verify_nbf: bool,

    /// Check `iat` when present
    pub verify_iat: bool,

    /// Check `iss` (mandatory claim)
    pub verify_iss: bool,

    /// Check `aud` against the expected audience when one is supplied
    pub verify_aud: bool,

    /// Check `sub` (mandatory claim)
    pub verify_sub: bool,

    /// Check `jti` (mandatory claim, must be a string)
    pub verify_jti: bool,

    /// Check the token-type claim (mandatory claim)
    pub verify_token_type: bool,

    /// Strict audience mode: both sides must be single strings compared
    /// by exact equality instead of set intersection
    pub strict_audience: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            verify_signature: true,
            verify_exp: true,
            verify_nbf: true,
            verify_iat: true,
            verify_iss: true,
            verify_aud: true,
            verify_sub: true,
            verify_jti: true,
            verify_token_type: true,
            strict_audience: false,
        }
    }
}

impl ValidationOptions {
    /// All checks disabled, signature included
    ///
    /// Callers that only need to peek inside a token start here and
    /// re-enable the specific checks they still want.
    pub fn insecure() -> Self {
        Self {
            verify_signature: false,
            verify_exp: false,
            verify_nbf: false,
            verify_iat: false,
            verify_iss: false,
            verify_aud: false,
            verify_sub: false,
            verify_jti: false,
            verify_token_type: false,
            strict_audience: false,
        }
    }
}

/// Expected claim values supplied per validation call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expectations {
    /// Acceptable issuers; any member matches
    pub issuer: Option<Vec<String>>,

    /// Acceptable audiences; matching is set intersection unless strict
    pub audience: Option<Vec<String>>,

    /// Exact expected subject
    pub subject: Option<String>,

    /// Exact expected token type ("access"/"refresh")
    pub token_type: Option<String>,
}

/// Pure validator over decoded claim sets
#[derive(Debug, Clone)]
pub struct ClaimValidator {
    names: ClaimNames,
}

impl ClaimValidator {
    /// Creates a validator addressing claims through the given registry
    pub fn new(names: ClaimNames) -> Self {
        Self { names }
    }

    /// Validates a claim set against the enabled checks
    ///
    /// # Arguments
    ///
    /// * `claims` - The decoded claim set
    /// * `options` - Which checks run
    /// * `expected` - Expected issuer/audience/subject/token-type values
    /// * `leeway` - Clock-skew tolerance in seconds
    /// * `now` - The caller's clock
    ///
    /// # Returns
    ///
    /// `Ok(())` when every enabled check passes, the first failing
    /// check's `TokenError` otherwise
    pub fn validate(
        &self,
        claims: &ClaimSet,
        options: &ValidationOptions,
        expected: &Expectations,
        leeway: i64,
        now: DateTime<Utc>,
    ) -> Result<(), TokenError> {
        let now = now.timestamp();

        if options.verify_iat {
            self.check_not_future(claims, &self.names.issued_at, now, leeway)?;
        }
        if options.verify_nbf {
            self.check_not_future(claims, &self.names.not_before, now, leeway)?;
        }
        if options.verify_exp {
            self.check_expiration(claims, now, leeway)?;
        }
        if options.verify_iss {
            self.check_issuer(claims, expected.issuer.as_deref())?;
        }
        if options.verify_aud {
            self.check_audience(claims, expected.audience.as_deref(), options.strict_audience)?;
        }
        if options.verify_sub {
            self.check_subject(claims, expected.subject.as_deref())?;
        }
        if options.verify_jti {
            self.require_string(claims, &self.names.jwt_id)?;
        }
        if options.verify_token_type {
            self.check_token_type(claims, expected.token_type.as_deref())?;
        }

        Ok(())
    }

    /// `iat`/`nbf` rule: optional, integer-typed, not future-dated beyond
    /// leeway
    fn check_not_future(
        &self,
        claims: &ClaimSet,
        claim: &str,
        now: i64,
        leeway: i64,
    ) -> Result<(), TokenError> {
        let Some(value) = claims.get(claim) else {
            return Ok(());
        };
        let at = integer_value(value).ok_or_else(|| TokenError::InvalidClaimFormat {
            claim: claim.to_string(),
        })?;
        if at > now + leeway {
            return Err(TokenError::Immature {
                claim: claim.to_string(),
            });
        }
        Ok(())
    }

    /// `exp` rule: mandatory, integer-typed, `exp <= now - leeway` is
    /// expired
    fn check_expiration(&self, claims: &ClaimSet, now: i64, leeway: i64) -> Result<(), TokenError> {
        let claim = &self.names.expiration;
        let value = claims.get(claim).ok_or_else(|| TokenError::MissingClaim {
            claim: claim.clone(),
        })?;
        let exp = integer_value(value).ok_or_else(|| TokenError::InvalidClaimFormat {
            claim: claim.clone(),
        })?;
        if exp <= now - leeway {
            return Err(TokenError::Expired);
        }
        Ok(())
    }

    /// `iss` rule: mandatory; membership in the expected set when one is
    /// supplied
    fn check_issuer(
        &self,
        claims: &ClaimSet,
        expected: Option<&[String]>,
    ) -> Result<(), TokenError> {
        let claim = &self.names.issuer;
        let issuer = self.require_string(claims, claim)?;
        if let Some(accepted) = expected {
            if !accepted.iter().any(|candidate| candidate == issuer) {
                return Err(TokenError::Mismatch {
                    claim: claim.clone(),
                });
            }
        }
        Ok(())
    }

    /// `aud` rule: claim optional unless an expected audience is
    /// supplied; set intersection, or exact single-string equality in
    /// strict mode
    fn check_audience(
        &self,
        claims: &ClaimSet,
        expected: Option<&[String]>,
        strict: bool,
    ) -> Result<(), TokenError> {
        let claim = &self.names.audience;
        let Some(accepted) = expected else {
            return Ok(());
        };
        let value = claims.get(claim).ok_or_else(|| TokenError::MissingClaim {
            claim: claim.clone(),
        })?;

        if strict {
            // Both sides must be single strings
            let claimed = value.as_str().ok_or_else(|| TokenError::InvalidClaimFormat {
                claim: claim.clone(),
            })?;
            return match accepted {
                [single] if single == claimed => Ok(()),
                _ => Err(TokenError::Mismatch {
                    claim: claim.clone(),
                }),
            };
        }

        let claimed: Vec<&str> = match value {
            Value::String(s) => vec![s.as_str()],
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str().ok_or_else(|| TokenError::InvalidClaimFormat {
                        claim: claim.clone(),
                    })
                })
                .collect::<Result<_, _>>()?,
            _ => {
                return Err(TokenError::InvalidClaimFormat {
                    claim: claim.clone(),
                })
            }
        };

        if claimed
            .iter()
            .any(|aud| accepted.iter().any(|candidate| candidate == aud))
        {
            Ok(())
        } else {
            Err(TokenError::Mismatch {
                claim: claim.clone(),
            })
        }
    }

    /// `sub` rule: mandatory string; exact match when expected
    fn check_subject(
        &self,
        claims: &ClaimSet,
        expected: Option<&str>,
    ) -> Result<(), TokenError> {
        let claim = &self.names.subject;
        let subject = self.require_string(claims, claim)?;
        if let Some(expected) = expected {
            if subject != expected {
                return Err(TokenError::Mismatch {
                    claim: claim.clone(),
                });
            }
        }
        Ok(())
    }

    /// Token-type rule: mandatory string; exact match when expected
    fn check_token_type(
        &self,
        claims: &ClaimSet,
        expected: Option<&str>,
    ) -> Result<(), TokenError> {
        let claim = &self.names.token_type;
        let token_type = self.require_string(claims, claim)?;
        if let Some(expected) = expected {
            if token_type != expected {
                return Err(TokenError::Mismatch {
                    claim: claim.clone(),
                });
            }
        }
        Ok(())
    }

    /// A claim that must be present and string-typed
    fn require_string<'c>(
        &self,
        claims: &'c ClaimSet,
        claim: &str,
    ) -> Result<&'c str, TokenError> {
        let value = claims.get(claim).ok_or_else(|| TokenError::MissingClaim {
            claim: claim.to_string(),
        })?;
        value.as_str().ok_or_else(|| TokenError::InvalidClaimFormat {
            claim: claim.to_string(),
        })
    }
}

/// Integer claim values; booleans and strings do not qualify
fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}
