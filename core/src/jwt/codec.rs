//! Compact token encoding and decoding
//!
//! The codec turns claim sets into signed `header.payload.signature`
//! strings and back. Signature operations are delegated to a
//! [`TokenBackend`], claim validation to the
//! [`ClaimValidator`](super::validator::ClaimValidator). Decoding fails
//! closed: an algorithm outside the allow-list is rejected before any
//! cryptographic check runs, so an attacker cannot steer verification to
//! a weaker algorithm.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};

use am_shared::config::{ClaimNames, TokenConfig};

use crate::errors::{DomainError, TokenError};
use crate::jwt::claims::ClaimSet;
use crate::jwt::token::{SessionToken, TokenKind};
use crate::jwt::validator::{ClaimValidator, Expectations, ValidationOptions};

/// Signing backend: algorithm plus key material
///
/// Symmetric (HMAC-SHA*) and asymmetric (RSA/EC/EdDSA) families are both
/// supported; the constructor picks the key parser from the algorithm
/// name.
pub struct TokenBackend {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenBackend {
    /// Builds a backend from configuration
    ///
    /// For symmetric algorithms the signing key doubles as the verifying
    /// key; asymmetric algorithms require PEM-encoded keys and use
    /// `verifying_key` when provided.
    pub fn from_config(config: &TokenConfig) -> Result<Self, DomainError> {
        let algorithm: Algorithm =
            config
                .algorithm
                .parse()
                .map_err(|_| DomainError::Validation {
                    message: format!("Unknown signing algorithm: {}", config.algorithm),
                })?;

        let signing = config.signing_key.as_bytes();
        let verifying = config
            .verifying_key
            .as_deref()
            .unwrap_or(&config.signing_key)
            .as_bytes();

        let (encoding_key, decoding_key) = match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => (
                EncodingKey::from_secret(signing),
                DecodingKey::from_secret(verifying),
            ),
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => (
                EncodingKey::from_rsa_pem(signing).map_err(key_error)?,
                DecodingKey::from_rsa_pem(verifying).map_err(key_error)?,
            ),
            Algorithm::ES256 | Algorithm::ES384 => (
                EncodingKey::from_ec_pem(signing).map_err(key_error)?,
                DecodingKey::from_ec_pem(verifying).map_err(key_error)?,
            ),
            Algorithm::EdDSA => (
                EncodingKey::from_ed_pem(signing).map_err(key_error)?,
                DecodingKey::from_ed_pem(verifying).map_err(key_error)?,
            ),
        };

        Ok(Self {
            algorithm,
            encoding_key,
            decoding_key,
        })
    }

    /// The backend's signing algorithm
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

fn key_error(err: jsonwebtoken::errors::Error) -> DomainError {
    DomainError::Internal {
        message: format!("Failed to load signing key: {}", err),
    }
}

/// Encoder/decoder for compact signed tokens
pub struct TokenCodec {
    backend: TokenBackend,
    validator: ClaimValidator,
    names: ClaimNames,
    /// Algorithms accepted during decode; the header's algorithm must be
    /// a member regardless of whether the signature would verify
    allowed_algorithms: Vec<Algorithm>,
    time_claims: Vec<String>,
    leeway: i64,
    issuer: Option<String>,
    audience: Option<String>,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
}

impl TokenCodec {
    /// Creates a codec with a backend built from configuration
    pub fn from_config(config: &TokenConfig) -> Result<Self, DomainError> {
        let backend = TokenBackend::from_config(config)?;
        Ok(Self::with_backend(backend, config))
    }

    /// Creates a codec over an externally constructed signing backend
    pub fn with_backend(backend: TokenBackend, config: &TokenConfig) -> Self {
        let names = config.claim_names.clone();
        let mut time_claims: Vec<String> =
            names.time_claims().iter().map(|s| s.to_string()).collect();
        time_claims.extend(config.extra_time_claims.iter().cloned());

        Self {
            allowed_algorithms: vec![backend.algorithm()],
            validator: ClaimValidator::new(names.clone()),
            names,
            time_claims,
            leeway: config.leeway_secs,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_lifetime: Duration::seconds(config.access_token_lifetime_secs),
            refresh_lifetime: Duration::seconds(config.refresh_token_lifetime_secs),
            backend,
        }
    }

    /// Overrides the decode-time algorithm allow-list
    pub fn with_allowed_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.allowed_algorithms = algorithms;
        self
    }

    /// The claim-name registry this codec addresses claims through
    pub fn claim_names(&self) -> &ClaimNames {
        &self.names
    }

    /// Lifetime for the given token kind
    pub fn lifetime(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_lifetime,
            TokenKind::Refresh => self.refresh_lifetime,
        }
    }

    /// Encodes a claim set into a signed compact token
    ///
    /// Datetime-valued entries of the configured time claims are
    /// converted to epoch integers before signing. The payload itself is
    /// not validated here; issuance goes through [`TokenCodec::issue`]
    /// which maintains the exp/iat/jti invariants.
    pub fn encode(&self, payload: &ClaimSet, header: Option<Header>) -> Result<String, TokenError> {
        let mut claims = payload.clone();
        claims.normalize_time_claims(self.time_claims.iter().map(String::as_str));

        let header = header.unwrap_or_else(|| Header::new(self.backend.algorithm()));
        jsonwebtoken::encode(&header, claims.as_map(), &self.backend.encoding_key).map_err(|err| {
            tracing::error!(error = %err, event = "token_encode_failed", "Failed to sign token");
            TokenError::GenerationFailed
        })
    }

    /// Decodes and validates a compact token, returning the payload
    pub fn decode(
        &self,
        token: &str,
        options: &ValidationOptions,
        expected: &Expectations,
    ) -> Result<ClaimSet, TokenError> {
        self.decode_at(token, options, expected, Utc::now())
            .map(|(_, claims)| claims)
    }

    /// Decodes and validates a compact token, returning header and
    /// payload
    pub fn decode_complete(
        &self,
        token: &str,
        options: &ValidationOptions,
        expected: &Expectations,
    ) -> Result<(Header, ClaimSet), TokenError> {
        self.decode_at(token, options, expected, Utc::now())
    }

    /// Decode against an explicit clock
    ///
    /// # Arguments
    ///
    /// * `token` - The compact token string
    /// * `options` - Which checks run; disabling signature verification
    ///   leaves every claim check to whatever the caller re-enabled
    /// * `expected` - Expected claim values; issuer/audience fall back to
    ///   the configured defaults when unset
    /// * `now` - The caller's clock
    pub fn decode_at(
        &self,
        token: &str,
        options: &ValidationOptions,
        expected: &Expectations,
        now: DateTime<Utc>,
    ) -> Result<(Header, ClaimSet), TokenError> {
        let mut validation = Validation::new(self.backend.algorithm());
        validation.algorithms = self.allowed_algorithms.clone();
        // Claim semantics are this crate's validator's job; jsonwebtoken
        // only checks the wire format and the signature
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        if !options.verify_signature {
            validation.insecure_disable_signature_validation();
        }

        let data =
            jsonwebtoken::decode::<Map<String, Value>>(token, &self.backend.decoding_key, &validation)
                .map_err(|err| {
                    let mapped = map_decode_error(&err);
                    tracing::debug!(
                        error = %err,
                        kind = ?mapped,
                        event = "token_decode_failed",
                        "Token rejected before claim validation"
                    );
                    mapped
                })?;

        let claims = ClaimSet::from(data.claims);
        let expected = self.effective_expectations(expected);
        self.validator
            .validate(&claims, options, &expected, self.leeway, now)?;

        Ok((data.header, claims))
    }

    /// Issues a fresh token of the given kind
    ///
    /// Populates `exp` (now + kind lifetime) and `iat` (now) when the
    /// payload does not carry them, always writes the token-type claim,
    /// and always regenerates `jti`.
    pub fn issue(&self, kind: TokenKind, payload: ClaimSet, now: DateTime<Utc>) -> SessionToken {
        let mut token = SessionToken::from_claims(kind, payload, self.names.clone());
        if let Some(issuer) = &self.issuer {
            if token.claims().get(&self.names.issuer).is_none() {
                token.set_claim(self.names.issuer.clone(), Value::from(issuer.clone()));
            }
        }
        if token.claims().get(&self.names.expiration).is_none() {
            token.set_expiration(now, self.lifetime(kind));
        }
        if token.claims().get(&self.names.issued_at).is_none() {
            token.set_issued_at(now);
        }
        token.regenerate_jwt_id();
        token
    }

    /// Signs a session token's current claim state
    pub fn sign(&self, token: &SessionToken) -> Result<String, TokenError> {
        self.encode(token.claims(), None)
    }

    /// Parses an encoded token into a typed session token
    ///
    /// The token-type claim is checked against `kind` on top of whatever
    /// the supplied options enable.
    pub fn parse(
        &self,
        kind: TokenKind,
        token: &str,
        options: &ValidationOptions,
        now: DateTime<Utc>,
    ) -> Result<SessionToken, TokenError> {
        let expected = Expectations {
            token_type: Some(kind.as_str().to_string()),
            ..Default::default()
        };
        let (_, claims) = self.decode_at(token, options, &expected, now)?;
        Ok(SessionToken::from_claims(kind, claims, self.names.clone()))
    }

    fn effective_expectations(&self, expected: &Expectations) -> Expectations {
        let mut merged = expected.clone();
        if merged.issuer.is_none() {
            merged.issuer = self.issuer.clone().map(|iss| vec![iss]);
        }
        if merged.audience.is_none() {
            merged.audience = self.audience.clone().map(|aud| vec![aud]);
        }
        merged
    }
}

/// Collapse the decode library's error surface onto the closed taxonomy
fn map_decode_error(err: &jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            TokenError::AlgorithmNotAllowed
        }
        _ => TokenError::Malformed,
    }
}
