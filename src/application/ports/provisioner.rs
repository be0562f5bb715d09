//! Worker provisioning port interface

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::error::JobError;

/// Provisioning errors
#[derive(Debug, Clone, Error)]
pub enum ProvisionError {
    #[error("no usable address for worker {name}: {detail}")]
    NoAddress { name: String, detail: String },

    #[error("provisioning backend failed: {0}")]
    Backend(String),
}

impl From<ProvisionError> for JobError {
    fn from(err: ProvisionError) -> Self {
        JobError::Provisioning(err.to_string())
    }
}

/// Destroy all workers left over from a previous run, recognized by the
/// shared name prefix.
///
/// # Returns
/// How many leftover workers were found.
pub async fn destroy_leftovers(provisioner: &dyn WorkerProvisioner) -> usize {
    let names = match provisioner.list_active().await {
        Ok(names) => names,
        Err(err) => {
            tracing::warn!("leftover worker listing failed: {err}");
            return 0;
        }
    };
    let leftovers: Vec<_> = names
        .into_iter()
        .filter(|name| name.starts_with(crate::domain::job::WORKER_NAME_PREFIX))
        .collect();
    for name in &leftovers {
        tracing::info!(worker = %name, "destroying leftover worker");
        provisioner.destroy(name).await;
    }
    leftovers.len()
}

/// Port for allocating and releasing ephemeral workers.
#[async_trait]
pub trait WorkerProvisioner: Send + Sync {
    /// Allocate one worker tagged with `name`.
    ///
    /// # Returns
    /// The reachable address of the worker.
    async fn provision(&self, name: &str) -> Result<String, ProvisionError>;

    /// Release the worker. Idempotent and tolerant of "already gone":
    /// backend errors are logged by the implementation, never returned,
    /// so teardown paths can call this unconditionally.
    async fn destroy(&self, name: &str);

    /// Names of all currently allocated workers, for leftover cleanup.
    async fn list_active(&self) -> Result<Vec<String>, ProvisionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeProvisioner {
        active: Vec<String>,
        destroyed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WorkerProvisioner for FakeProvisioner {
        async fn provision(&self, _name: &str) -> Result<String, ProvisionError> {
            Ok("10.0.0.1".to_string())
        }

        async fn destroy(&self, name: &str) {
            self.destroyed.lock().unwrap().push(name.to_string());
        }

        async fn list_active(&self) -> Result<Vec<String>, ProvisionError> {
            Ok(self.active.clone())
        }
    }

    #[tokio::test]
    async fn leftover_cleanup_only_touches_prefixed_workers() {
        let provisioner = FakeProvisioner {
            active: vec![
                "wkrdeadbeef".to_string(),
                "wkrwarm123".to_string(),
                "unrelated-vm".to_string(),
            ],
            destroyed: Mutex::new(Vec::new()),
        };

        let count = destroy_leftovers(&provisioner).await;

        assert_eq!(count, 2);
        assert_eq!(
            *provisioner.destroyed.lock().unwrap(),
            vec!["wkrdeadbeef".to_string(), "wkrwarm123".to_string()]
        );
    }
}
