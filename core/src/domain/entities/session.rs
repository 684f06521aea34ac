//! Session entity: one (user, platform, device) triple

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::platform::{Platform, PlatformKind};

/// A device's authenticated relationship with the platform
///
/// Unique per (user, platform, device): the first login from a triple
/// creates the session, repeat logins touch `last_auth_time` on the
/// existing record. Revocation is terminal and cascades to the session's
/// refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier for the session
    pub id: Uuid,

    /// User the session belongs to (opaque identifier)
    pub user_id: String,

    /// Platform identifier; becomes the audience of derived tokens
    pub platform_sub_id: String,

    /// Platform classification at creation time
    pub platform_kind: PlatformKind,

    /// Client-stable device identifier
    pub device_id: String,

    /// Stamped from the platform kind when the session is created
    pub is_mobile: bool,

    /// Last successful authentication on this triple
    pub last_auth_time: DateTime<Utc>,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    /// Terminal revocation flag
    pub revoked: bool,
}

impl Session {
    /// Creates a session for a first-ever login from a triple
    pub fn new(
        user_id: impl Into<String>,
        platform: &Platform,
        device_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            platform_sub_id: platform.sub_id.clone(),
            platform_kind: platform.kind,
            device_id: device_id.into(),
            is_mobile: platform.kind.is_mobile(),
            last_auth_time: now,
            created_at: now,
            revoked: false,
        }
    }

    /// Records a repeat login on the same triple
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_auth_time = now;
    }

    /// Marks the session revoked
    pub fn revoke(&mut self) {
        self.revoked = true;
    }

    /// Whether the session can still back authorization decisions
    pub fn is_active(&self) -> bool {
        !self.revoked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_new_session_stamps_mobile_flag() {
        let mobile = Session::new(
            "user-1",
            &Platform::new("app-ios", PlatformKind::Mobile),
            "device-1",
            at(0),
        );
        assert!(mobile.is_mobile);

        let web = Session::new(
            "user-1",
            &Platform::new("app-web", PlatformKind::Web),
            "device-2",
            at(0),
        );
        assert!(!web.is_mobile);
    }

    #[test]
    fn test_touch_updates_last_auth_only() {
        let mut session = Session::new(
            "user-1",
            &Platform::new("app-ios", PlatformKind::Mobile),
            "device-1",
            at(0),
        );
        session.touch(at(100));

        assert_eq!(session.last_auth_time, at(100));
        assert_eq!(session.created_at, at(0));
    }

    #[test]
    fn test_revocation_is_terminal() {
        let mut session = Session::new(
            "user-1",
            &Platform::new("app-ios", PlatformKind::Mobile),
            "device-1",
            at(0),
        );
        assert!(session.is_active());

        session.revoke();
        assert!(!session.is_active());
    }
}
