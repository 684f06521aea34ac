//! Platform descriptor consumed from the surrounding system

use serde::{Deserialize, Serialize};

/// Coarse platform classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    Mobile,
    Desktop,
    Web,
    Other,
}

impl PlatformKind {
    /// Wire value of the platform-type claim
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformKind::Mobile => "mobile",
            PlatformKind::Desktop => "desktop",
            PlatformKind::Web => "web",
            PlatformKind::Other => "other",
        }
    }

    /// Whether sessions on this platform are flagged as mobile
    pub fn is_mobile(&self) -> bool {
        matches!(self, PlatformKind::Mobile)
    }
}

/// The platform a client authenticates from
///
/// `sub_id` doubles as the token audience. Credential decryption and
/// other platform capabilities live in the surrounding system; the core
/// only reads identity and classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    /// Stable platform identifier, used as the audience claim
    pub sub_id: String,

    /// Classification driving the session's mobile flag and the
    /// platform-type claim
    pub kind: PlatformKind,
}

impl Platform {
    /// Creates a platform descriptor
    pub fn new(sub_id: impl Into<String>, kind: PlatformKind) -> Self {
        Self {
            sub_id: sub_id.into(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert!(PlatformKind::Mobile.is_mobile());
        assert!(!PlatformKind::Web.is_mobile());
        assert_eq!(PlatformKind::Desktop.as_str(), "desktop");
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&PlatformKind::Web).unwrap();
        assert_eq!(json, r#""web""#);
    }
}
