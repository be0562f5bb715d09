//! Cache warming loop
//!
//! The transcription models live in a cache that goes cold when no worker
//! has run for a while. During idle periods the warmer either deploys a
//! throwaway worker or touches the local cache to keep the artifacts
//! resident, so the next real job avoids a cold start.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use crate::domain::job::WORKER_NAME_PREFIX;

use super::ports::LocalTranscriber;
use super::runner::{connect_with_retry, RunnerDeps};
use super::scheduler::Scheduler;

/// Bound for the remote cache-refresh command.
const WARM_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// Cache warmer settings.
#[derive(Debug, Clone)]
pub struct WarmerSettings {
    pub poll_interval: Duration,
    /// Warm only when this much time has passed since the last dispatch or
    /// warm cycle
    pub idle_threshold: Duration,
    /// Extra wait after a failed cycle before the next tick retries
    pub failure_backoff: Duration,
    /// Deploy a throwaway worker instead of warming the local cache
    pub deploy: bool,
    /// Remote command that touches the model artifacts
    pub warm_command: String,
}

impl Default for WarmerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            idle_threshold: Duration::from_secs(12 * 60 * 60),
            failure_backoff: Duration::from_secs(60),
            deploy: false,
            warm_command: "/usr/local/bin/refresh-model-cache".to_string(),
        }
    }
}

fn warm_worker_name() -> String {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{WORKER_NAME_PREFIX}warm{ts}")
}

/// Run the warming loop forever.
///
/// Warming is skipped while any job is queued, so it never competes with
/// real work for capacity. A failed cycle does not reset the idle clock;
/// the next tick retries after a short backoff.
pub async fn run_cache_warmer(
    scheduler: Arc<Scheduler>,
    deps: Arc<RunnerDeps>,
    local: Arc<dyn LocalTranscriber>,
    settings: WarmerSettings,
) {
    loop {
        tokio::time::sleep(settings.poll_interval).await;

        if !scheduler.queue_is_empty() || scheduler.idle_for() < settings.idle_threshold {
            continue;
        }

        let warmed = if settings.deploy {
            let name = warm_worker_name();
            info!(worker = %name, "running cache warmer");
            warm_remote(&deps, &name, &settings.warm_command).await
        } else {
            info!("warming local model cache");
            warm_local(local.as_ref()).await
        };

        if warmed {
            scheduler.mark_activity();
        } else {
            tokio::time::sleep(settings.failure_backoff).await;
        }
    }
}

/// One deploy-mode warming cycle. The throwaway worker is destroyed on every
/// exit path.
async fn warm_remote(deps: &RunnerDeps, name: &str, warm_command: &str) -> bool {
    let address = match deps.provisioner.provision(name).await {
        Ok(address) => address,
        Err(err) => {
            warn!(worker = %name, "warm provision failed: {err}");
            deps.provisioner.destroy(name).await;
            return false;
        }
    };

    let warmed = match connect_with_retry(
        deps.remote.as_ref(),
        &address,
        deps.timeouts.connect_budget,
        deps.timeouts.connect_retry,
    )
    .await
    {
        Ok(session) => {
            let result = session.exec(warm_command, WARM_COMMAND_TIMEOUT).await;
            session.close().await;
            match result {
                Ok(_) => true,
                Err(err) => {
                    warn!(worker = %name, "warm command failed: {err}");
                    false
                }
            }
        }
        Err(err) => {
            warn!(worker = %name, "warm connect failed: {err}");
            false
        }
    };

    deps.provisioner.destroy(name).await;
    warmed
}

async fn warm_local(local: &dyn LocalTranscriber) -> bool {
    match local.warm_cache().await {
        Ok(()) => true,
        Err(err) => {
            warn!("local cache warm failed: {err}");
            false
        }
    }
}
