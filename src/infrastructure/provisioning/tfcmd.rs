//! Grid provisioning adapter
//!
//! Shells out to the `tfcmd` binary to deploy and cancel worker VMs on the
//! grid. Output parsing is deliberately loose: the deploy output only needs
//! to yield one reachable address.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::application::ports::{ProvisionError, WorkerProvisioner};

/// Resolved worker sizing for deploys.
#[derive(Debug, Clone)]
pub struct TfcmdSizing {
    pub image: String,
    pub entrypoint: String,
    pub cpus: u32,
    pub ram_gb: u32,
    pub rootfs_gb: u32,
    pub node_id: Option<String>,
}

/// tfcmd-backed provisioner
pub struct TfcmdProvisioner {
    ssh_pub_key: PathBuf,
    sizing: TfcmdSizing,
}

impl TfcmdProvisioner {
    pub fn new(ssh_pub_key: impl Into<PathBuf>, sizing: TfcmdSizing) -> Self {
        Self {
            ssh_pub_key: ssh_pub_key.into(),
            sizing,
        }
    }

    fn deploy_args(&self, name: &str) -> Vec<String> {
        let mut args = vec![
            "deploy".to_string(),
            "vm".to_string(),
            "--name".to_string(),
            name.to_string(),
            "--ssh".to_string(),
            self.ssh_pub_key.to_string_lossy().to_string(),
            "--flist".to_string(),
            self.sizing.image.clone(),
            "--entrypoint".to_string(),
            self.sizing.entrypoint.clone(),
            "--cpu".to_string(),
            self.sizing.cpus.to_string(),
            "--memory".to_string(),
            self.sizing.ram_gb.to_string(),
            "--rootfs".to_string(),
            self.sizing.rootfs_gb.to_string(),
            "--mycelium".to_string(),
        ];
        if let Some(node) = &self.sizing.node_id {
            args.push("--node".to_string());
            args.push(node.clone());
        }
        args
    }
}

/// Pull the mycelium address out of tfcmd's deploy output.
fn parse_address(stdout: &str) -> Option<String> {
    for line in stdout.lines() {
        let lower = line.to_ascii_lowercase();
        if lower.contains("mycelium") && lower.contains("ip") {
            if let Some(addr) = line.split_whitespace().last() {
                let addr = addr.trim_matches(|c: char| !c.is_ascii_hexdigit() && c != ':' && c != '.');
                if !addr.is_empty() {
                    return Some(addr.to_string());
                }
            }
        }
    }
    None
}

#[async_trait]
impl WorkerProvisioner for TfcmdProvisioner {
    async fn provision(&self, name: &str) -> Result<String, ProvisionError> {
        info!(worker = name, "deploying worker VM");
        let output = Command::new("tfcmd")
            .args(self.deploy_args(name))
            .output()
            .await
            .map_err(|e| ProvisionError::Backend(e.to_string()))?;

        if !output.status.success() {
            return Err(ProvisionError::Backend(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_address(&stdout).ok_or_else(|| ProvisionError::NoAddress {
            name: name.to_string(),
            detail: "deploy output carries no mycelium address".to_string(),
        })
    }

    async fn destroy(&self, name: &str) {
        info!(worker = name, "canceling worker VM");
        match Command::new("tfcmd").args(["cancel", name]).output().await {
            Ok(output) if output.status.success() => {}
            Ok(output) => {
                // "already gone" lands here too and is fine
                warn!(
                    worker = name,
                    "tfcmd cancel reported: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
            Err(err) => warn!(worker = name, "tfcmd cancel failed to run: {err}"),
        }
    }

    async fn list_active(&self) -> Result<Vec<String>, ProvisionError> {
        let output = Command::new("tfcmd")
            .args(["list"])
            .output()
            .await
            .map_err(|e| ProvisionError::Backend(e.to_string()))?;

        if !output.status.success() {
            return Err(ProvisionError::Backend(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let names = String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .map(|s| s.to_string())
            .collect::<Vec<_>>();
        debug!(count = names.len(), "active deployments");
        Ok(names)
    }
}
