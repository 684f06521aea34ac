//! Session repository trait defining the interface for session persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::entities::session::Session;
use crate::domain::value_objects::platform::Platform;
use crate::errors::DomainError;

/// Repository contract for [`Session`] persistence
///
/// Sessions are unique per (user, platform, device).
///
/// # Security Considerations
/// - `get_or_create_by_triple` must be atomic per triple: concurrent
///   logins from the same device must never yield duplicate sessions
/// - Revocation must be visible to subsequent reads immediately
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Atomically fetch or create the session for a triple
    ///
    /// On a hit the session's `last_auth_time` is updated in the same
    /// operation; a revoked session does not count as a hit.
    ///
    /// # Returns
    /// * `Ok((session, created))` - The live session and whether it was
    ///   newly created
    /// * `Err(DomainError)` - Storage error
    async fn get_or_create_by_triple(
        &self,
        user_id: &str,
        platform: &Platform,
        device_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(Session, bool), DomainError>;

    /// Find a session by its id
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Session>, DomainError>;

    /// Persist updated session state
    async fn save(&self, session: Session) -> Result<Session, DomainError>;

    /// Flag a session revoked
    ///
    /// # Returns
    /// * `Ok(true)` - Session was revoked
    /// * `Ok(false)` - No session with that id
    async fn revoke(&self, id: Uuid) -> Result<bool, DomainError>;
}
