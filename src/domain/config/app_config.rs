//! Application configuration value object

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::transcript::{Language, ModelTier};

/// Sizing parameters for provisioned workers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerSizing {
    pub image: Option<String>,
    pub entrypoint: Option<String>,
    pub cpus: Option<u32>,
    pub ram_gb: Option<u32>,
    pub rootfs_gb: Option<u32>,
    pub node_id: Option<String>,
}

/// Cache warmer settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WarmerConfig {
    pub interval_hours: Option<u64>,
    pub poll_secs: Option<u64>,
    /// Warm by deploying a throwaway worker instead of touching the local
    /// cache. Needed when workers run on a separate node.
    pub deploy: Option<bool>,
    pub warm_command: Option<String>,
}

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub bot_token: Option<String>,
    pub allowed_submitters: Option<Vec<i64>>,
    pub allowed_usernames: Option<Vec<String>>,
    pub default_model: Option<String>,
    pub default_language: Option<String>,
    pub global_limit: Option<usize>,
    pub per_submitter_limit: Option<usize>,
    pub job_timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub connect_retry_secs: Option<u64>,
    pub command_idle_timeout_secs: Option<u64>,
    pub tmp_dir: Option<String>,
    pub ssh_key_path: Option<String>,
    /// Fixed worker address for development; disables provisioning, leftover
    /// cleanup, and the cache warmer.
    pub worker_address: Option<String>,
    pub worker: Option<WorkerSizing>,
    pub warmer: Option<WarmerConfig>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        Self {
            bot_token: None,
            allowed_submitters: Some(Vec::new()),
            allowed_usernames: Some(Vec::new()),
            default_model: Some("turbo".to_string()),
            default_language: Some("auto".to_string()),
            global_limit: Some(1),
            per_submitter_limit: Some(1),
            job_timeout_secs: Some(3 * 60 * 60),
            connect_timeout_secs: Some(90),
            connect_retry_secs: Some(3),
            command_idle_timeout_secs: Some(300),
            tmp_dir: Some("/tmp/scribe-fleet".to_string()),
            ssh_key_path: None,
            worker_address: None,
            worker: Some(WorkerSizing {
                image: Some("scribe-fleet-worker:latest".to_string()),
                entrypoint: Some("/sbin/init".to_string()),
                cpus: Some(4),
                ram_gb: Some(8),
                rootfs_gb: Some(20),
                node_id: None,
            }),
            warmer: Some(WarmerConfig {
                interval_hours: Some(12),
                poll_secs: Some(60),
                deploy: Some(false),
                warm_command: Some("/usr/local/bin/refresh-model-cache".to_string()),
            }),
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            bot_token: other.bot_token.or(self.bot_token),
            allowed_submitters: other.allowed_submitters.or(self.allowed_submitters),
            allowed_usernames: other.allowed_usernames.or(self.allowed_usernames),
            default_model: other.default_model.or(self.default_model),
            default_language: other.default_language.or(self.default_language),
            global_limit: other.global_limit.or(self.global_limit),
            per_submitter_limit: other.per_submitter_limit.or(self.per_submitter_limit),
            job_timeout_secs: other.job_timeout_secs.or(self.job_timeout_secs),
            connect_timeout_secs: other.connect_timeout_secs.or(self.connect_timeout_secs),
            connect_retry_secs: other.connect_retry_secs.or(self.connect_retry_secs),
            command_idle_timeout_secs: other
                .command_idle_timeout_secs
                .or(self.command_idle_timeout_secs),
            tmp_dir: other.tmp_dir.or(self.tmp_dir),
            ssh_key_path: other.ssh_key_path.or(self.ssh_key_path),
            worker_address: other.worker_address.or(self.worker_address),
            worker: Self::merge_worker(self.worker, other.worker),
            warmer: Self::merge_warmer(self.warmer, other.warmer),
        }
    }

    fn merge_worker(base: Option<WorkerSizing>, other: Option<WorkerSizing>) -> Option<WorkerSizing> {
        match (base, other) {
            (None, None) => None,
            (Some(b), None) => Some(b),
            (None, Some(o)) => Some(o),
            (Some(b), Some(o)) => Some(WorkerSizing {
                image: o.image.or(b.image),
                entrypoint: o.entrypoint.or(b.entrypoint),
                cpus: o.cpus.or(b.cpus),
                ram_gb: o.ram_gb.or(b.ram_gb),
                rootfs_gb: o.rootfs_gb.or(b.rootfs_gb),
                node_id: o.node_id.or(b.node_id),
            }),
        }
    }

    fn merge_warmer(base: Option<WarmerConfig>, other: Option<WarmerConfig>) -> Option<WarmerConfig> {
        match (base, other) {
            (None, None) => None,
            (Some(b), None) => Some(b),
            (None, Some(o)) => Some(o),
            (Some(b), Some(o)) => Some(WarmerConfig {
                interval_hours: o.interval_hours.or(b.interval_hours),
                poll_secs: o.poll_secs.or(b.poll_secs),
                deploy: o.deploy.or(b.deploy),
                warm_command: o.warm_command.or(b.warm_command),
            }),
        }
    }

    /// Get default model tier, or turbo if not set/invalid
    pub fn default_model_or_default(&self) -> ModelTier {
        self.default_model
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    /// Get default language, or auto if not set/invalid
    pub fn default_language_or_default(&self) -> Language {
        self.default_language
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    pub fn global_limit_or_default(&self) -> usize {
        self.global_limit.unwrap_or(1).max(1)
    }

    pub fn per_submitter_limit_or_default(&self) -> usize {
        self.per_submitter_limit.unwrap_or(1).max(1)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs.unwrap_or(3 * 60 * 60))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.unwrap_or(90))
    }

    pub fn connect_retry_interval(&self) -> Duration {
        Duration::from_secs(self.connect_retry_secs.unwrap_or(3))
    }

    pub fn command_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.command_idle_timeout_secs.unwrap_or(300))
    }

    pub fn tmp_dir_or_default(&self) -> std::path::PathBuf {
        std::path::PathBuf::from(
            self.tmp_dir
                .as_deref()
                .unwrap_or("/tmp/scribe-fleet"),
        )
    }

    pub fn warmer_interval(&self) -> Duration {
        let hours = self
            .warmer
            .as_ref()
            .and_then(|w| w.interval_hours)
            .unwrap_or(12);
        Duration::from_secs(hours * 60 * 60)
    }

    pub fn warmer_poll_interval(&self) -> Duration {
        let secs = self.warmer.as_ref().and_then(|w| w.poll_secs).unwrap_or(60);
        Duration::from_secs(secs)
    }

    pub fn warmer_deploy(&self) -> bool {
        self.warmer.as_ref().and_then(|w| w.deploy).unwrap_or(false)
    }

    pub fn warm_command_or_default(&self) -> String {
        self.warmer
            .as_ref()
            .and_then(|w| w.warm_command.clone())
            .unwrap_or_else(|| "/usr/local/bin/refresh-model-cache".to_string())
    }
}
