//! Mock implementation of OtpDeviceRepository for testing

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::errors::DomainError;

use super::r#trait::{OtpDevice, OtpDeviceRepository};

/// In-memory verifier-device repository
pub struct MockOtpDeviceRepository<D: OtpDevice> {
    devices: Arc<RwLock<HashMap<String, D>>>,
}

impl<D: OtpDevice> MockOtpDeviceRepository<D> {
    /// Create a new mock repository
    pub fn new() -> Self {
        Self {
            devices: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<D: OtpDevice> Default for MockOtpDeviceRepository<D> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<D: OtpDevice> OtpDeviceRepository<D> for MockOtpDeviceRepository<D> {
    async fn find_for_user(&self, user_id: &str) -> Result<Option<D>, DomainError> {
        let devices = self.devices.read().await;
        Ok(devices.get(user_id).cloned())
    }

    async fn save(&self, device: D) -> Result<D, DomainError> {
        let mut devices = self.devices.write().await;
        devices.insert(device.user_id().to_string(), device.clone());
        Ok(device)
    }

    async fn delete_for_user(&self, user_id: &str) -> Result<bool, DomainError> {
        let mut devices = self.devices.write().await;
        Ok(devices.remove(user_id).is_some())
    }
}
