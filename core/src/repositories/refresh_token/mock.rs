//! Mock implementation of RefreshTokenRepository for testing

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::entities::refresh_token::{AttachedPlugin, RefreshTokenRecord};
use crate::errors::DomainError;

use super::r#trait::RefreshTokenRepository;

/// In-memory refresh token repository
pub struct MockRefreshTokenRepository {
    records: Arc<RwLock<HashMap<Uuid, RefreshTokenRecord>>>,
}

impl MockRefreshTokenRepository {
    /// Create a new mock repository
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MockRefreshTokenRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RefreshTokenRepository for MockRefreshTokenRepository {
    async fn save(&self, record: RefreshTokenRecord) -> Result<RefreshTokenRecord, DomainError> {
        let mut records = self.records.write().await;
        records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<RefreshTokenRecord>, DomainError> {
        let records = self.records.read().await;
        Ok(records.get(&id).cloned())
    }

    async fn find_by_session(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<RefreshTokenRecord>, DomainError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn attach_plugin(
        &self,
        token_id: Uuid,
        plugin: AttachedPlugin,
    ) -> Result<RefreshTokenRecord, DomainError> {
        // Upsert under one write lock: concurrent attaches of the same
        // plugin name cannot duplicate the record
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&token_id)
            .ok_or_else(|| DomainError::NotFound {
                resource: format!("refresh token {}", token_id),
            })?;
        record.attach_plugin(plugin);
        Ok(record.clone())
    }

    async fn revoke(&self, id: Uuid) -> Result<bool, DomainError> {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(&id) {
            record.revoke();
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn revoke_by_session(&self, session_id: Uuid) -> Result<usize, DomainError> {
        let mut records = self.records.write().await;
        let mut count = 0;
        for record in records.values_mut() {
            if record.session_id == session_id && !record.revoked {
                record.revoke();
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::ClaimSet;
    use chrono::Utc;
    use serde_json::json;

    fn record(session_id: Uuid) -> RefreshTokenRecord {
        RefreshTokenRecord::new(session_id, "user-1", None, Utc::now())
    }

    fn plugin(name: &str, value: &str) -> AttachedPlugin {
        let mut claims = ClaimSet::new();
        claims.insert("x", json!(value));
        AttachedPlugin {
            name: name.to_string(),
            claims,
        }
    }

    #[tokio::test]
    async fn test_save_and_find() {
        let repo = MockRefreshTokenRepository::new();
        let saved = repo.save(record(Uuid::new_v4())).await.unwrap();

        let found = repo.find_by_id(saved.id).await.unwrap().unwrap();
        assert_eq!(found, saved);
    }

    #[tokio::test]
    async fn test_attach_plugin_upserts() {
        let repo = MockRefreshTokenRepository::new();
        let saved = repo.save(record(Uuid::new_v4())).await.unwrap();

        repo.attach_plugin(saved.id, plugin("tenant", "a"))
            .await
            .unwrap();
        let updated = repo
            .attach_plugin(saved.id, plugin("tenant", "b"))
            .await
            .unwrap();

        assert_eq!(updated.plugins.len(), 1);
        assert_eq!(updated.plugin_claims().get_str("x"), Some("b"));
    }

    #[tokio::test]
    async fn test_attach_plugin_to_unknown_record() {
        let repo = MockRefreshTokenRepository::new();
        let err = repo
            .attach_plugin(Uuid::new_v4(), plugin("tenant", "a"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_revoke_by_session() {
        let repo = MockRefreshTokenRepository::new();
        let session_id = Uuid::new_v4();

        repo.save(record(session_id)).await.unwrap();
        repo.save(record(session_id)).await.unwrap();
        repo.save(record(Uuid::new_v4())).await.unwrap();

        let revoked = repo.revoke_by_session(session_id).await.unwrap();
        assert_eq!(revoked, 2);

        for record in repo.find_by_session(session_id).await.unwrap() {
            assert!(record.revoked);
        }
    }
}
