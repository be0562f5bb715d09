//! Input staging port interface

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::error::JobError;

/// Staging errors
#[derive(Debug, Clone, Error)]
pub enum StagingError {
    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("failed to write staged file: {0}")]
    WriteFailed(String),
}

impl From<StagingError> for JobError {
    fn from(err: StagingError) -> Self {
        JobError::Download(err.to_string())
    }
}

/// Reference to an inbound attachment held by the chat transport.
#[derive(Debug, Clone)]
pub struct AttachmentRef {
    /// Transport-side handle of the file
    pub file_id: String,
    /// Inferred filename, already meaningful to the submitter
    pub filename: String,
}

/// Port for materializing an inbound attachment as a local file.
#[async_trait]
pub trait InputStager: Send + Sync {
    /// Download the attachment's bytes into `dest`.
    async fn stage(&self, attachment: &AttachmentRef, dest: &Path) -> Result<(), StagingError>;
}
