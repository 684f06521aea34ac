//! Refresh-token claim plugins
//!
//! A plugin is an attachable claims contributor associated one-to-one
//! with a refresh token record. Plugin types are looked up through an
//! explicit registry keyed by name, populated eagerly at startup;
//! there is no lazy string-to-type resolution anywhere.

pub mod tenant;

use std::collections::HashMap;

use crate::domain::entities::refresh_token::AttachedPlugin;
use crate::errors::DomainError;
use crate::jwt::ClaimSet;

pub use tenant::TenantSelection;

/// A claims contributor attachable to a refresh token record
pub trait ClaimsPlugin: Send + Sync + std::fmt::Debug {
    /// Stable plugin name; the upsert key on the record
    fn name(&self) -> &str;

    /// Claims this plugin contributes to derived tokens
    fn extra_claims(&self) -> ClaimSet;

    /// Materializes the attachable record form
    fn to_attached(&self) -> AttachedPlugin {
        AttachedPlugin {
            name: self.name().to_string(),
            claims: self.extra_claims(),
        }
    }
}

/// Factory from stored plugin fields back to a plugin instance
pub type PluginFactory = fn(&ClaimSet) -> Result<Box<dyn ClaimsPlugin>, DomainError>;

/// Name-keyed plugin factory lookup, resolved eagerly at startup
pub struct PluginRegistry {
    factories: HashMap<String, PluginFactory>,
}

impl PluginRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with every built-in plugin registered
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(tenant::PLUGIN_NAME, tenant::TenantSelection::from_claims);
        registry
    }

    /// Registers a factory under a name
    pub fn register(&mut self, name: impl Into<String>, factory: PluginFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Whether a plugin name is known
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Builds a plugin instance from its stored fields
    pub fn build(&self, name: &str, fields: &ClaimSet) -> Result<Box<dyn ClaimsPlugin>, DomainError> {
        let factory = self.factories.get(name).ok_or_else(|| DomainError::NotFound {
            resource: format!("plugin '{}'", name),
        })?;
        factory(fields)
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_tenant_plugin_registered() {
        let registry = PluginRegistry::with_builtins();
        assert!(registry.contains("tenant"));
        assert!(!registry.contains("unknown"));
    }

    #[test]
    fn test_unknown_plugin_is_not_found() {
        let registry = PluginRegistry::with_builtins();
        let err = registry.build("unknown", &ClaimSet::new()).unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[test]
    fn test_build_round_trips_stored_fields() {
        let registry = PluginRegistry::with_builtins();

        let mut fields = ClaimSet::new();
        fields.insert("tni", json!("tenant-1"));
        fields.insert("tno", json!("owner-9"));
        fields.insert("rri", json!([1, 2]));

        let plugin = registry.build("tenant", &fields).unwrap();
        assert_eq!(plugin.name(), "tenant");
        assert_eq!(plugin.extra_claims().get_str("tni"), Some("tenant-1"));
    }
}
