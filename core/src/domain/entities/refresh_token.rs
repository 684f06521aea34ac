//! Refresh token record: the persisted anchor of a token chain
//!
//! Access and refresh tokens are derived views over this record's claims;
//! the record itself is what multi-factor confirmation and plugin
//! attachment mutate. `issued_at` is written once at creation and never
//! changes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use am_shared::config::ClaimNames;

use crate::jwt::ClaimSet;

/// A named claims contribution attached to a refresh token record
///
/// One plugin record per (token, name); attach order is preserved because
/// it decides merge precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachedPlugin {
    /// Plugin name ("tenant", ...)
    pub name: String,

    /// Claims this plugin contributes to derived tokens
    pub claims: ClaimSet,
}

/// Persisted refresh token state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    /// Unique identifier; becomes the `rti` claim of derived tokens
    pub id: Uuid,

    /// Session this record belongs to
    pub session_id: Uuid,

    /// Subject of derived tokens (the user id)
    pub subject: String,

    /// Audience of derived tokens (the platform sub-id)
    pub audience: Option<String>,

    /// Earliest instant derived tokens are valid from
    pub not_before: Option<DateTime<Utc>>,

    /// When this record was created; immutable once set
    pub issued_at: DateTime<Utc>,

    /// Whether step-up verification has passed for this chain
    pub multi_factor_auth: bool,

    /// When the passed verification lapses
    pub multi_factor_expires: Option<DateTime<Utc>>,

    /// Which verifier passed ("authenticator", "email", ...)
    pub multi_factor_ref: Option<String>,

    /// Free-form claims merged into every derived token
    pub extra_claims: ClaimSet,

    /// Attached plugins in attach order
    pub plugins: Vec<AttachedPlugin>,

    /// Terminal revocation flag
    pub revoked: bool,
}

impl RefreshTokenRecord {
    /// Creates a record under a session
    pub fn new(
        session_id: Uuid,
        subject: impl Into<String>,
        audience: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            subject: subject.into(),
            audience,
            not_before: None,
            issued_at: now,
            multi_factor_auth: false,
            multi_factor_expires: None,
            multi_factor_ref: None,
            extra_claims: ClaimSet::new(),
            plugins: Vec::new(),
            revoked: false,
        }
    }

    /// Names of the attached plugins, in attach order
    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name.as_str()).collect()
    }

    /// Attaches or replaces a plugin's claims
    ///
    /// Idempotent per name: re-attaching replaces the claims in place and
    /// keeps the original position in the merge order.
    pub fn attach_plugin(&mut self, plugin: AttachedPlugin) {
        if let Some(existing) = self.plugins.iter_mut().find(|p| p.name == plugin.name) {
            existing.claims = plugin.claims;
        } else {
            self.plugins.push(plugin);
        }
    }

    /// Union of every attached plugin's claims, merged in attach order
    ///
    /// Later plugins overwrite earlier keys. The overwrite is kept for
    /// compatibility with observed behavior but logged, since two plugins
    /// fighting over a key is almost certainly a misconfiguration.
    pub fn plugin_claims(&self) -> ClaimSet {
        let mut merged = ClaimSet::new();
        for plugin in &self.plugins {
            for (key, value) in plugin.claims.iter() {
                if let Some(previous) = merged.insert(key.clone(), value.clone()) {
                    if previous != *value {
                        tracing::warn!(
                            claim = %key,
                            plugin = %plugin.name,
                            event = "plugin_claim_collision",
                            "Plugin claim overwrites an earlier plugin's value"
                        );
                    }
                }
            }
        }
        merged
    }

    /// Marks the chain as step-up verified
    ///
    /// # Arguments
    ///
    /// * `reference` - Which verifier passed
    /// * `now` - The caller's clock
    /// * `lifetime` - How long the verification stays current
    pub fn update_multi_factor(
        &mut self,
        reference: impl Into<String>,
        now: DateTime<Utc>,
        lifetime: Duration,
    ) {
        self.multi_factor_auth = true;
        self.multi_factor_ref = Some(reference.into());
        self.multi_factor_expires = Some(now + lifetime);
    }

    /// Marks the record revoked; terminal
    pub fn revoke(&mut self) {
        self.revoked = true;
    }

    /// When the chain expires: `(not_before ?? issued_at) + lifetime`
    pub fn expires_at(&self, refresh_lifetime: Duration) -> DateTime<Utc> {
        self.not_before.unwrap_or(self.issued_at) + refresh_lifetime
    }

    /// Whether the chain is still within its lifetime
    pub fn is_alive(&self, now: DateTime<Utc>, refresh_lifetime: Duration) -> bool {
        now <= self.expires_at(refresh_lifetime)
    }

    /// Claim set for a derived access token
    ///
    /// Registered claims, then free-form extras, then plugin claims, then
    /// the multi-factor claims and the record/session identifiers.
    pub fn access_claims(&self, names: &ClaimNames) -> ClaimSet {
        let mut claims = ClaimSet::new();
        claims.insert(names.subject.clone(), Value::from(self.subject.clone()));
        if let Some(audience) = &self.audience {
            claims.insert(names.audience.clone(), Value::from(audience.clone()));
        }
        if let Some(not_before) = self.not_before {
            claims.insert_datetime(names.not_before.clone(), not_before);
        }

        claims.merge(&self.extra_claims);
        claims.merge(&self.plugin_claims());

        claims.insert(
            names.multi_factor.clone(),
            Value::from(self.multi_factor_auth),
        );
        if let Some(expires) = self.multi_factor_expires {
            claims.insert_datetime(names.multi_factor_expires.clone(), expires);
        }
        if let Some(reference) = &self.multi_factor_ref {
            claims.insert(
                names.multi_factor_ref.clone(),
                Value::from(reference.clone()),
            );
        }

        claims.insert(
            names.refresh_token_id.clone(),
            Value::from(self.id.to_string()),
        );
        claims.insert(
            names.session_id.clone(),
            Value::from(self.session_id.to_string()),
        );
        claims
    }

    /// Claim set for a derived refresh token
    ///
    /// The access claim set plus `exp`/`iat` pinned to the chain's own
    /// lifetime rather than the per-call clock.
    pub fn refresh_claims(&self, names: &ClaimNames, refresh_lifetime: Duration) -> ClaimSet {
        let mut claims = self.access_claims(names);
        claims.insert_datetime(names.expiration.clone(), self.expires_at(refresh_lifetime));
        claims.insert_datetime(names.issued_at.clone(), self.issued_at);
        claims
    }
}
