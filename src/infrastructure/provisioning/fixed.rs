//! Fixed-address provisioner for development
//!
//! Points every job at one long-lived worker instead of deploying VMs.
//! Destroy is a no-op so the shared worker survives job teardown.

use async_trait::async_trait;
use tracing::debug;

use crate::application::ports::{ProvisionError, WorkerProvisioner};

pub struct FixedAddressProvisioner {
    address: String,
}

impl FixedAddressProvisioner {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl WorkerProvisioner for FixedAddressProvisioner {
    async fn provision(&self, name: &str) -> Result<String, ProvisionError> {
        debug!(worker = name, address = %self.address, "using fixed worker address");
        Ok(self.address.clone())
    }

    async fn destroy(&self, name: &str) {
        debug!(worker = name, "fixed worker address, skipping destroy");
    }

    async fn list_active(&self) -> Result<Vec<String>, ProvisionError> {
        Ok(Vec::new())
    }
}
