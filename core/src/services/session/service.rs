//! Main session service implementation

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use am_shared::config::TokenConfig;

use crate::domain::entities::refresh_token::RefreshTokenRecord;
use crate::domain::entities::session::Session;
use crate::domain::events::{DomainEvent, EventPublisher};
use crate::domain::value_objects::platform::Platform;
use crate::domain::value_objects::token_pair::TokenPair;
use crate::errors::{DomainError, DomainResult, TokenError};
use crate::jwt::{ClaimSet, SessionToken, TokenCodec, TokenKind, ValidationOptions};
use crate::plugins::{ClaimsPlugin, PluginRegistry};
use crate::repositories::{RefreshTokenRepository, SessionRepository};

/// Service for session lifecycle and token issuance
///
/// Owns the login → refresh-token → signed-pair flow and the liveness
/// checks behind access-token refresh. Every mutation persists before the
/// corresponding event goes out.
pub struct SessionService<S, R, P>
where
    S: SessionRepository,
    R: RefreshTokenRepository,
    P: EventPublisher,
{
    sessions: Arc<S>,
    refresh_tokens: Arc<R>,
    publisher: Arc<P>,
    codec: Arc<TokenCodec>,
    registry: PluginRegistry,
    config: TokenConfig,
}

impl<S, R, P> SessionService<S, R, P>
where
    S: SessionRepository,
    R: RefreshTokenRepository,
    P: EventPublisher,
{
    /// Creates a new session service
    pub fn new(
        sessions: Arc<S>,
        refresh_tokens: Arc<R>,
        publisher: Arc<P>,
        codec: Arc<TokenCodec>,
        config: TokenConfig,
    ) -> Self {
        Self {
            sessions,
            refresh_tokens,
            publisher,
            codec,
            registry: PluginRegistry::with_builtins(),
            config,
        }
    }

    /// Replaces the plugin registry
    pub fn with_plugin_registry(mut self, registry: PluginRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Logs a user in on a (user, platform, device) triple
    ///
    /// # Returns
    ///
    /// The session and whether it was newly created. Repeat logins reuse
    /// the session and bump its `last_auth_time`.
    pub async fn login(
        &self,
        user_id: &str,
        platform: &Platform,
        device_id: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<(Session, bool)> {
        let (session, created) = self
            .sessions
            .get_or_create_by_triple(user_id, platform, device_id, now)
            .await?;

        tracing::info!(
            user_id = user_id,
            session_id = %session.id,
            created = created,
            event = "session_login",
            "Session login"
        );
        Ok((session, created))
    }

    /// Creates a refresh token chain under a session
    ///
    /// With `mfa_required` the chain starts unverified and a verifier
    /// must confirm it. Without it (first-ever login) the chain is
    /// pre-authorized: the caller-supplied reference and a short
    /// multi-factor session expiry are stamped so the grace window does
    /// not immediately demand a second factor.
    pub async fn generate_refresh_token(
        &self,
        session: &Session,
        mfa_required: bool,
        mfa_ref: Option<&str>,
        now: DateTime<Utc>,
    ) -> DomainResult<RefreshTokenRecord> {
        let names = self.codec.claim_names();
        let mut record = RefreshTokenRecord::new(
            session.id,
            session.user_id.clone(),
            Some(session.platform_sub_id.clone()),
            now,
        );
        record.extra_claims.insert(
            names.platform_type.clone(),
            serde_json::Value::from(session.platform_kind.as_str()),
        );

        record.multi_factor_auth = !mfa_required;
        if !mfa_required {
            record.multi_factor_ref = mfa_ref.map(str::to_string);
            record.multi_factor_expires =
                Some(now + Duration::seconds(self.config.multi_factor_session_lifetime_secs));
        }

        let record = self.refresh_tokens.save(record).await?;
        tracing::info!(
            session_id = %session.id,
            token_id = %record.id,
            multi_factor = record.multi_factor_auth,
            event = "refresh_token_issued",
            "Refresh token chain created"
        );
        self.publisher.publish(DomainEvent::RefreshTokenIssued {
            session_id: session.id,
            token_id: record.id,
        });
        Ok(record)
    }

    /// Derives an unsigned access token from a chain
    pub fn derive_access_token(
        &self,
        record: &RefreshTokenRecord,
        overrides: Option<&ClaimSet>,
        now: DateTime<Utc>,
    ) -> SessionToken {
        let mut claims = record.access_claims(self.codec.claim_names());
        if let Some(overrides) = overrides {
            claims.merge(overrides);
        }
        self.codec.issue(TokenKind::Access, claims, now)
    }

    /// Derives an unsigned refresh token from a chain
    ///
    /// `exp`/`iat` come from the chain itself, not the call clock, so
    /// re-deriving never extends the chain's life.
    pub fn derive_refresh_token(
        &self,
        record: &RefreshTokenRecord,
        overrides: Option<&ClaimSet>,
        now: DateTime<Utc>,
    ) -> SessionToken {
        let refresh_lifetime = Duration::seconds(self.config.refresh_token_lifetime_secs);
        let mut claims = record.refresh_claims(self.codec.claim_names(), refresh_lifetime);
        if let Some(overrides) = overrides {
            claims.merge(overrides);
        }
        self.codec.issue(TokenKind::Refresh, claims, now)
    }

    /// Signs both derived tokens for a chain
    pub fn issue_tokens(
        &self,
        record: &RefreshTokenRecord,
        now: DateTime<Utc>,
    ) -> DomainResult<TokenPair> {
        let access = self.derive_access_token(record, None, now);
        let refresh = self.derive_refresh_token(record, None, now);
        Ok(TokenPair::new(
            self.codec.sign(&access)?,
            self.codec.sign(&refresh)?,
            self.config.access_token_lifetime_secs,
            self.config.refresh_token_lifetime_secs,
        ))
    }

    /// Exchanges a refresh token string for a fresh signed access token
    ///
    /// Liveness is checked against current store state on every call: a
    /// revoked or expired chain, or a revoked session, fails the exchange
    /// no matter how recently the token itself was minted.
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<String> {
        let token = self
            .codec
            .parse(TokenKind::Refresh, refresh_token, &ValidationOptions::default(), now)?;

        let record = self.lookup_live_record(&token, now).await?;

        let access = self.derive_access_token(&record, None, now);
        let signed = self.codec.sign(&access)?;
        tracing::debug!(
            token_id = %record.id,
            event = "access_token_refreshed",
            "Access token derived from refresh token"
        );
        self.publisher
            .publish(DomainEvent::AccessTokenRefreshed { token_id: record.id });
        Ok(signed)
    }

    /// Attaches a plugin's claims to a chain
    pub async fn attach_plugin(
        &self,
        token_id: Uuid,
        plugin: &dyn ClaimsPlugin,
    ) -> DomainResult<RefreshTokenRecord> {
        let record = self
            .refresh_tokens
            .attach_plugin(token_id, plugin.to_attached())
            .await?;
        tracing::info!(
            token_id = %token_id,
            plugin = plugin.name(),
            event = "plugin_attached",
            "Plugin claims attached to refresh token"
        );
        self.publisher.publish(DomainEvent::PluginAttached {
            token_id,
            plugin: plugin.name().to_string(),
        });
        Ok(record)
    }

    /// Attaches a registered plugin by name from stored fields
    pub async fn attach_plugin_by_name(
        &self,
        token_id: Uuid,
        name: &str,
        fields: &ClaimSet,
    ) -> DomainResult<RefreshTokenRecord> {
        let plugin = self.registry.build(name, fields)?;
        self.attach_plugin(token_id, plugin.as_ref()).await
    }

    /// Revokes a session and every refresh token chain under it
    ///
    /// # Returns
    ///
    /// The number of chains revoked
    pub async fn revoke_session(&self, session_id: Uuid) -> DomainResult<usize> {
        if !self.sessions.revoke(session_id).await? {
            return Err(DomainError::NotFound {
                resource: format!("session {}", session_id),
            });
        }
        let revoked = self.refresh_tokens.revoke_by_session(session_id).await?;

        tracing::info!(
            session_id = %session_id,
            tokens_revoked = revoked,
            event = "session_revoked",
            "Session and its refresh tokens revoked"
        );
        self.publisher
            .publish(DomainEvent::SessionRevoked { session_id });
        Ok(revoked)
    }

    /// Resolves a parsed refresh token to a live, unexpired chain
    async fn lookup_live_record(
        &self,
        token: &SessionToken,
        now: DateTime<Utc>,
    ) -> DomainResult<RefreshTokenRecord> {
        let names = self.codec.claim_names();
        let rti = token
            .refresh_token_id()
            .ok_or_else(|| TokenError::MissingClaim {
                claim: names.refresh_token_id.clone(),
            })?;
        let token_id: Uuid = rti.parse().map_err(|_| TokenError::InvalidClaimFormat {
            claim: names.refresh_token_id.clone(),
        })?;

        let record = self
            .refresh_tokens
            .find_by_id(token_id)
            .await?
            .ok_or(TokenError::Revoked)?;
        if record.revoked {
            return Err(TokenError::Revoked.into());
        }

        let refresh_lifetime = Duration::seconds(self.config.refresh_token_lifetime_secs);
        if !record.is_alive(now, refresh_lifetime) {
            return Err(TokenError::Expired.into());
        }

        let session = self
            .sessions
            .find_by_id(record.session_id)
            .await?
            .ok_or(TokenError::Revoked)?;
        if !session.is_active() {
            return Err(TokenError::Revoked.into());
        }

        Ok(record)
    }
}
