//! Verifier-device repository trait, generic over the device type.

use async_trait::async_trait;

use crate::domain::entities::backup_code::BackupCodeSet;
use crate::domain::entities::email_otp::EmailOtp;
use crate::domain::entities::mobile_otp::MobileOtp;
use crate::domain::entities::security_code::SecurityCode;
use crate::domain::entities::totp::TotpAuthenticator;
use crate::errors::DomainError;

/// A persistable verifier credential owned by one user
pub trait OtpDevice: Clone + Send + Sync + 'static {
    /// Owner of the credential; the lookup key
    fn user_id(&self) -> &str;
}

impl OtpDevice for TotpAuthenticator {
    fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl OtpDevice for EmailOtp {
    fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl OtpDevice for MobileOtp {
    fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl OtpDevice for BackupCodeSet {
    fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl OtpDevice for SecurityCode {
    fn user_id(&self) -> &str {
        &self.user_id
    }
}

/// Repository contract for one verifier type's credentials
///
/// Each of the five verifier types gets its own store instance; the
/// per-user record is the unit of persistence, and every verify/generate
/// call writes its state change back through [`save`](Self::save) before
/// returning to the caller.
#[async_trait]
pub trait OtpDeviceRepository<D: OtpDevice>: Send + Sync {
    /// The user's credential for this verifier type, if enrolled
    async fn find_for_user(&self, user_id: &str) -> Result<Option<D>, DomainError>;

    /// Persist a credential, inserting or replacing the user's record
    async fn save(&self, device: D) -> Result<D, DomainError>;

    /// Remove the user's credential
    ///
    /// # Returns
    /// * `Ok(true)` - Credential removed
    /// * `Ok(false)` - Nothing was enrolled
    async fn delete_for_user(&self, user_id: &str) -> Result<bool, DomainError>;
}
