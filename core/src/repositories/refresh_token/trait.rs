//! Refresh token repository trait defining the interface for token-chain
//! persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::entities::refresh_token::{AttachedPlugin, RefreshTokenRecord};
use crate::errors::DomainError;

/// Repository contract for [`RefreshTokenRecord`] persistence
///
/// # Security Considerations
/// - Revocation must be visible to subsequent reads immediately; a
///   decode-time liveness check reads current store state, never a cache
/// - Plugin attachment is an upsert unique per (token, plugin name)
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    /// Persist a record, inserting or replacing by id
    async fn save(&self, record: RefreshTokenRecord) -> Result<RefreshTokenRecord, DomainError>;

    /// Find a record by its id
    async fn find_by_id(&self, id: Uuid) -> Result<Option<RefreshTokenRecord>, DomainError>;

    /// All records belonging to a session
    async fn find_by_session(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<RefreshTokenRecord>, DomainError>;

    /// Atomically attach or replace a plugin's claims on a record
    ///
    /// # Returns
    /// * `Ok(record)` - The updated record
    /// * `Err(DomainError::NotFound)` - No record with that id
    async fn attach_plugin(
        &self,
        token_id: Uuid,
        plugin: AttachedPlugin,
    ) -> Result<RefreshTokenRecord, DomainError>;

    /// Flag a record revoked
    ///
    /// # Returns
    /// * `Ok(true)` - Record was revoked
    /// * `Ok(false)` - No record with that id
    async fn revoke(&self, id: Uuid) -> Result<bool, DomainError>;

    /// Revoke every record belonging to a session
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of records revoked
    async fn revoke_by_session(&self, session_id: Uuid) -> Result<usize, DomainError>;
}
