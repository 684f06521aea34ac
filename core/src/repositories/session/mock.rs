//! Mock implementation of SessionRepository for testing

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::entities::session::Session;
use crate::domain::value_objects::platform::Platform;
use crate::errors::DomainError;

use super::r#trait::SessionRepository;

type Triple = (String, String, String);

/// In-memory session repository
///
/// The triple-keyed map plus a single write lock gives the same
/// atomic-upsert guarantee a unique index provides in a real store.
pub struct MockSessionRepository {
    sessions: Arc<RwLock<HashMap<Triple, Session>>>,
}

impl MockSessionRepository {
    /// Create a new mock repository
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of stored sessions (revoked included)
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for MockSessionRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionRepository for MockSessionRepository {
    async fn get_or_create_by_triple(
        &self,
        user_id: &str,
        platform: &Platform,
        device_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(Session, bool), DomainError> {
        let key = (
            user_id.to_string(),
            platform.sub_id.clone(),
            device_id.to_string(),
        );
        // Lookup and insert happen under one write lock
        let mut sessions = self.sessions.write().await;

        if let Some(session) = sessions.get_mut(&key) {
            if session.is_active() {
                session.touch(now);
                return Ok((session.clone(), false));
            }
        }

        let session = Session::new(user_id, platform, device_id, now);
        sessions.insert(key, session.clone());
        Ok((session, true))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Session>, DomainError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.values().find(|s| s.id == id).cloned())
    }

    async fn save(&self, session: Session) -> Result<Session, DomainError> {
        let key = (
            session.user_id.clone(),
            session.platform_sub_id.clone(),
            session.device_id.clone(),
        );
        let mut sessions = self.sessions.write().await;
        sessions.insert(key, session.clone());
        Ok(session)
    }

    async fn revoke(&self, id: Uuid) -> Result<bool, DomainError> {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.values_mut().find(|s| s.id == id) {
            session.revoke();
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
