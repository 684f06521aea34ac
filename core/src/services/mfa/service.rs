//! Main multi-factor verification service implementation

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use am_shared::config::{MfaConfig, TokenConfig};

use crate::domain::entities::backup_code::BackupCodeSet;
use crate::domain::entities::email_otp::EmailOtp;
use crate::domain::entities::mobile_otp::MobileOtp;
use crate::domain::entities::refresh_token::RefreshTokenRecord;
use crate::domain::entities::security_code::SecurityCode;
use crate::domain::entities::totp::TotpAuthenticator;
use crate::domain::events::{DomainEvent, EventPublisher};
use crate::errors::{DomainError, DomainResult, OtpError};
use crate::repositories::{OtpDevice, OtpDeviceRepository, RefreshTokenRepository};

/// Multi-factor reference written into tokens by each verifier
pub const METHOD_AUTHENTICATOR: &str = "authenticator";
pub const METHOD_EMAIL: &str = "email";
pub const METHOD_MOBILE: &str = "mobile";
pub const METHOD_BACKUP_CODE: &str = "backup_code";
pub const METHOD_SECURITY_CODE: &str = "security_code";

/// Service orchestrating the verifier family
///
/// Wraps the five verifier entities with persistence, per-record
/// serialization, and event publication. Verification is serialized per
/// (verifier, user): the throttle's check-then-act would otherwise admit
/// more concurrent attempts than the backoff intends.
pub struct MfaService<R, P>
where
    R: RefreshTokenRepository,
    P: EventPublisher,
{
    totp: Arc<dyn OtpDeviceRepository<TotpAuthenticator>>,
    email: Arc<dyn OtpDeviceRepository<EmailOtp>>,
    mobile: Arc<dyn OtpDeviceRepository<MobileOtp>>,
    backup: Arc<dyn OtpDeviceRepository<BackupCodeSet>>,
    security: Arc<dyn OtpDeviceRepository<SecurityCode>>,
    refresh_tokens: Arc<R>,
    publisher: Arc<P>,
    config: MfaConfig,
    multi_factor_session_lifetime: Duration,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<R, P> MfaService<R, P>
where
    R: RefreshTokenRepository,
    P: EventPublisher,
{
    /// Creates a new multi-factor service
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        totp: Arc<dyn OtpDeviceRepository<TotpAuthenticator>>,
        email: Arc<dyn OtpDeviceRepository<EmailOtp>>,
        mobile: Arc<dyn OtpDeviceRepository<MobileOtp>>,
        backup: Arc<dyn OtpDeviceRepository<BackupCodeSet>>,
        security: Arc<dyn OtpDeviceRepository<SecurityCode>>,
        refresh_tokens: Arc<R>,
        publisher: Arc<P>,
        config: MfaConfig,
        token_config: &TokenConfig,
    ) -> Self {
        Self {
            totp,
            email,
            mobile,
            backup,
            security,
            refresh_tokens,
            publisher,
            config,
            multi_factor_session_lifetime: Duration::seconds(
                token_config.multi_factor_session_lifetime_secs,
            ),
            locks: Mutex::new(HashMap::new()),
        }
    }

    // TOTP

    /// Enrolls or re-enrolls an authenticator
    ///
    /// Re-enrollment replaces the secret and is bounded by the setup
    /// cooldown. The returned entity carries the secret for provisioning
    /// display.
    pub async fn setup_totp(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<TotpAuthenticator> {
        let _guard = self.serialize(METHOD_AUTHENTICATOR, user_id).await;

        let device = match self.totp.find_for_user(user_id).await? {
            Some(mut device) => {
                device.regenerate(now, &self.config.totp)?;
                device
            }
            None => TotpAuthenticator::new(user_id, now, &self.config.totp),
        };
        let device = self.totp.save(device).await?;

        tracing::info!(
            user_id = user_id,
            event = "totp_enrolled",
            "Authenticator secret generated"
        );
        Ok(device)
    }

    /// Verifies an authenticator code
    pub async fn verify_totp(
        &self,
        user_id: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let config = self.config.totp.clone();
        self.run_verify(&self.totp, user_id, METHOD_AUTHENTICATOR, now, move |d| {
            d.verify(code, now, &config)
        })
        .await
    }

    // Email OTP

    /// Generates a pin for email delivery, subject to the resend cooldown
    ///
    /// The pin is returned for the mailer; the hashed state is durable
    /// before this returns.
    pub async fn request_email_otp(
        &self,
        user_id: &str,
        email: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<String> {
        let _guard = self.serialize(METHOD_EMAIL, user_id).await;

        let mut device = match self.email.find_for_user(user_id).await? {
            Some(device) => device,
            None => EmailOtp::new(user_id, email),
        };
        let pin = device.generate(now, &self.config.email_otp)?;
        self.email.save(device).await?;

        tracing::info!(
            user_id = user_id,
            event = "otp_generated",
            method = METHOD_EMAIL,
            "Email pin generated"
        );
        self.publisher.publish(DomainEvent::OtpGenerated {
            user_id: user_id.to_string(),
            method: METHOD_EMAIL.to_string(),
        });
        Ok(pin)
    }

    /// Verifies an email pin
    pub async fn verify_email_otp(
        &self,
        user_id: &str,
        pin: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let config = self.config.email_otp.clone();
        self.run_verify(&self.email, user_id, METHOD_EMAIL, now, move |d| {
            d.verify(pin, now, &config)
        })
        .await
    }

    // Mobile OTP

    /// Generates a pin for SMS delivery, subject to the resend cooldown
    pub async fn request_mobile_otp(
        &self,
        user_id: &str,
        phone: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<String> {
        let _guard = self.serialize(METHOD_MOBILE, user_id).await;

        let mut device = match self.mobile.find_for_user(user_id).await? {
            Some(device) => device,
            None => MobileOtp::new(user_id, phone),
        };
        let pin = device.generate(now, &self.config.mobile_otp)?;
        self.mobile.save(device).await?;

        tracing::info!(
            user_id = user_id,
            event = "otp_generated",
            method = METHOD_MOBILE,
            "Mobile pin generated"
        );
        self.publisher.publish(DomainEvent::OtpGenerated {
            user_id: user_id.to_string(),
            method: METHOD_MOBILE.to_string(),
        });
        Ok(pin)
    }

    /// Verifies a mobile pin
    pub async fn verify_mobile_otp(
        &self,
        user_id: &str,
        pin: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let config = self.config.mobile_otp.clone();
        self.run_verify(&self.mobile, user_id, METHOD_MOBILE, now, move |d| {
            d.verify(pin, now, &config)
        })
        .await
    }

    // Backup codes

    /// Generates or regenerates the user's backup code batch
    ///
    /// # Returns
    ///
    /// The plaintext codes; only digests are stored
    pub async fn generate_backup_codes(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<String>> {
        let _guard = self.serialize(METHOD_BACKUP_CODE, user_id).await;

        let (device, codes) = match self.backup.find_for_user(user_id).await? {
            Some(mut device) => {
                let codes = device.regenerate(now, &self.config.backup_codes)?;
                (device, codes)
            }
            None => BackupCodeSet::generate(user_id, now, &self.config.backup_codes),
        };
        self.backup.save(device).await?;

        tracing::info!(
            user_id = user_id,
            count = codes.len(),
            event = "backup_codes_generated",
            "Backup code batch generated"
        );
        Ok(codes)
    }

    /// Spends a backup code
    pub async fn verify_backup_code(
        &self,
        user_id: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let config = self.config.backup_codes.clone();
        self.run_verify(&self.backup, user_id, METHOD_BACKUP_CODE, now, move |d| {
            d.verify(code, now, &config)
        })
        .await
    }

    // Security code

    /// Sets or replaces the user's security pin
    pub async fn set_security_code(
        &self,
        user_id: &str,
        pin: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<SecurityCode> {
        let _guard = self.serialize(METHOD_SECURITY_CODE, user_id).await;

        let device = match self.security.find_for_user(user_id).await? {
            Some(mut device) => {
                device.set_pin(pin, now, &self.config.security_code)?;
                device
            }
            None => SecurityCode::new(user_id, pin, now, &self.config.security_code)?,
        };
        self.security.save(device).await
    }

    /// Verifies the security pin
    pub async fn verify_security_code(
        &self,
        user_id: &str,
        pin: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let config = self.config.security_code.clone();
        self.run_verify(&self.security, user_id, METHOD_SECURITY_CODE, now, move |d| {
            d.verify(pin, now, &config)
        })
        .await
    }

    // Confirmation

    /// Marks a refresh token chain as step-up verified
    ///
    /// Called after one of the verifiers returned true; the freshly
    /// derived access tokens carry the multi-factor claims from here on.
    pub async fn confirm_session(
        &self,
        token_id: Uuid,
        reference: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<RefreshTokenRecord> {
        let mut record = self
            .refresh_tokens
            .find_by_id(token_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                resource: format!("refresh token {}", token_id),
            })?;

        record.update_multi_factor(reference, now, self.multi_factor_session_lifetime);
        let record = self.refresh_tokens.save(record).await?;

        tracing::info!(
            token_id = %token_id,
            reference = reference,
            event = "multi_factor_confirmed",
            "Refresh token chain marked step-up verified"
        );
        self.publisher.publish(DomainEvent::MultiFactorVerified {
            user_id: record.subject.clone(),
            token_id,
            reference: reference.to_string(),
        });
        Ok(record)
    }

    /// Runs one verification attempt under the per-record lock
    ///
    /// State changes (throttle increments included) are persisted before
    /// the outcome is returned; a throttled rejection changes nothing and
    /// persists nothing.
    async fn run_verify<D, F>(
        &self,
        repo: &Arc<dyn OtpDeviceRepository<D>>,
        user_id: &str,
        method: &str,
        now: DateTime<Utc>,
        attempt: F,
    ) -> DomainResult<bool>
    where
        D: OtpDevice,
        F: FnOnce(&mut D) -> Result<bool, OtpError>,
    {
        let _guard = self.serialize(method, user_id).await;

        let mut device =
            repo.find_for_user(user_id)
                .await?
                .ok_or_else(|| DomainError::NotFound {
                    resource: format!("{} credential for user {}", method, user_id),
                })?;

        match attempt(&mut device) {
            Ok(success) => {
                repo.save(device).await?;
                if success {
                    tracing::info!(
                        user_id = user_id,
                        method = method,
                        event = "otp_verified",
                        "Verification succeeded"
                    );
                } else {
                    tracing::warn!(
                        user_id = user_id,
                        method = method,
                        event = "otp_verification_failed",
                        "Verification failed"
                    );
                    self.publisher.publish(DomainEvent::MultiFactorFailed {
                        user_id: user_id.to_string(),
                        method: method.to_string(),
                    });
                }
                Ok(success)
            }
            Err(err) => {
                tracing::warn!(
                    user_id = user_id,
                    method = method,
                    error = %err,
                    event = "otp_attempt_blocked",
                    "Verification attempt blocked before running"
                );
                Err(err.into())
            }
        }
    }

    /// One lock per (verifier, user): the throttle pre-check and the
    /// state write must not interleave across concurrent attempts
    async fn serialize(&self, method: &str, user_id: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let key = format!("{}:{}", method, user_id);
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(
                locks
                    .entry(key)
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}
