//! Remote execution channel port interface

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Remote execution errors
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    #[error("could not reach {0}")]
    Unreachable(String),

    #[error("remote command exited with status {status}: {detail}")]
    CommandFailed { status: i32, detail: String },

    #[error("remote command timed out after {0:?}")]
    TimedOut(Duration),

    #[error("file transfer failed: {0}")]
    TransferFailed(String),

    #[error("session error: {0}")]
    Session(String),
}

impl From<RemoteError> for crate::domain::error::JobError {
    fn from(err: RemoteError) -> Self {
        crate::domain::error::JobError::RemoteCommand(err.to_string())
    }
}

/// Port for opening execution sessions against a worker address.
#[async_trait]
pub trait RemoteChannel: Send + Sync {
    /// Open a session against `address`. A single attempt; callers retry
    /// around this to absorb worker boot latency.
    async fn connect(&self, address: &str) -> Result<Box<dyn RemoteSession>, RemoteError>;
}

/// An established execution session against one worker.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Run a command, capturing stdout. A non-zero exit status is an error.
    async fn exec(&self, command: &str, timeout: Duration) -> Result<String, RemoteError>;

    /// Transfer a local file to the given remote path.
    async fn upload(&self, local: &Path, remote: &str) -> Result<(), RemoteError>;

    /// Close the session. Best-effort; never fails.
    async fn close(&self);
}

/// Quote a string for safe interpolation into a remote shell command line.
pub fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\"'\"'"))
}
