//! Tenant-selection plugin
//!
//! Attached when a user picks a tenant after login; contributes the
//! tenant id, the tenant owner, and the user's role ids within that
//! tenant to every token derived from the chain.

use serde_json::Value;

use am_shared::config::ClaimNames;

use crate::errors::DomainError;
use crate::jwt::ClaimSet;

use super::ClaimsPlugin;

/// Registry key for this plugin
pub const PLUGIN_NAME: &str = "tenant";

/// Tenant-selection claims contributor
#[derive(Debug, Clone, PartialEq)]
pub struct TenantSelection {
    /// Selected tenant id
    pub tenant_id: String,

    /// Owner of the selected tenant
    pub tenant_owner: Option<String>,

    /// The user's role ids within the tenant
    pub role_ids: Vec<i64>,

    names: ClaimNames,
}

impl TenantSelection {
    /// Creates a tenant selection with the default claim keys
    pub fn new(
        tenant_id: impl Into<String>,
        tenant_owner: Option<String>,
        role_ids: Vec<i64>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            tenant_owner,
            role_ids,
            names: ClaimNames::default(),
        }
    }

    /// Remaps the claim keys this plugin writes
    pub fn with_claim_names(mut self, names: ClaimNames) -> Self {
        self.names = names;
        self
    }

    /// Factory from stored plugin fields (registry entry point)
    pub fn from_claims(fields: &ClaimSet) -> Result<Box<dyn ClaimsPlugin>, DomainError> {
        let names = ClaimNames::default();
        let tenant_id = fields
            .get_str(&names.tenant_id)
            .ok_or_else(|| DomainError::Validation {
                message: format!("tenant plugin fields missing '{}'", names.tenant_id),
            })?
            .to_string();
        let tenant_owner = fields.get_str(&names.tenant_owner).map(str::to_string);
        let role_ids = match fields.get(&names.role_ids) {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_i64).collect(),
            _ => Vec::new(),
        };

        Ok(Box::new(Self {
            tenant_id,
            tenant_owner,
            role_ids,
            names,
        }))
    }
}

impl ClaimsPlugin for TenantSelection {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn extra_claims(&self) -> ClaimSet {
        let mut claims = ClaimSet::new();
        claims.insert(
            self.names.tenant_id.clone(),
            Value::from(self.tenant_id.clone()),
        );
        if let Some(owner) = &self.tenant_owner {
            claims.insert(self.names.tenant_owner.clone(), Value::from(owner.clone()));
        }
        claims.insert(
            self.names.role_ids.clone(),
            Value::from(self.role_ids.clone()),
        );
        claims
    }
}
