//! OpenSSH remote execution adapter
//!
//! Drives workers through the system `ssh` and `scp` binaries. Each exec is
//! its own ssh invocation; `connect` probes reachability so the runner's
//! retry loop can absorb worker boot latency.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::application::ports::{RemoteChannel, RemoteError, RemoteSession};

/// Bound for the reachability probe run by `connect`.
const CONNECT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// OpenSSH channel factory
pub struct OpensshChannel {
    key_path: PathBuf,
    username: String,
}

impl OpensshChannel {
    pub fn new(key_path: impl Into<PathBuf>, username: impl Into<String>) -> Self {
        Self {
            key_path: key_path.into(),
            username: username.into(),
        }
    }
}

#[async_trait]
impl RemoteChannel for OpensshChannel {
    async fn connect(&self, address: &str) -> Result<Box<dyn RemoteSession>, RemoteError> {
        let session = OpensshSession {
            key_path: self.key_path.clone(),
            username: self.username.clone(),
            address: address.to_string(),
        };
        // A single round trip proves sshd is up and the key is accepted.
        session
            .exec("true", CONNECT_PROBE_TIMEOUT)
            .await
            .map_err(|_| RemoteError::Unreachable(address.to_string()))?;
        Ok(Box::new(session))
    }
}

/// One worker's ssh session
struct OpensshSession {
    key_path: PathBuf,
    username: String,
    address: String,
}

/// Options shared by every ssh/scp invocation. Workers are throwaway, so
/// host keys are neither checked nor recorded.
fn common_options(key_path: &Path) -> Vec<String> {
    vec![
        "-i".to_string(),
        key_path.to_string_lossy().to_string(),
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        "-o".to_string(),
        "StrictHostKeyChecking=no".to_string(),
        "-o".to_string(),
        "UserKnownHostsFile=/dev/null".to_string(),
        "-o".to_string(),
        "LogLevel=ERROR".to_string(),
    ]
}

fn ssh_target(username: &str, address: &str) -> String {
    format!("{username}@{address}")
}

/// scp requires IPv6 literals in brackets.
fn scp_target(username: &str, address: &str, remote_path: &str) -> String {
    if address.contains(':') {
        format!("{username}@[{address}]:{remote_path}")
    } else {
        format!("{username}@{address}:{remote_path}")
    }
}

#[async_trait]
impl RemoteSession for OpensshSession {
    async fn exec(&self, command: &str, timeout: Duration) -> Result<String, RemoteError> {
        let mut cmd = Command::new("ssh");
        cmd.args(common_options(&self.key_path))
            .arg(ssh_target(&self.username, &self.address))
            .arg(command)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| RemoteError::TimedOut(timeout))?
            .map_err(|e| RemoteError::Session(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(RemoteError::CommandFailed {
                status: output.status.code().unwrap_or(-1),
                detail: detail.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<(), RemoteError> {
        let mut cmd = Command::new("scp");
        cmd.args(common_options(&self.key_path))
            .arg("-p")
            .arg(local)
            .arg(scp_target(&self.username, &self.address, remote))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = cmd
            .output()
            .await
            .map_err(|e| RemoteError::TransferFailed(e.to_string()))?;

        if !output.status.success() {
            return Err(RemoteError::TransferFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(())
    }

    async fn close(&self) {
        // sessions are per-command; nothing is held open
    }
}
