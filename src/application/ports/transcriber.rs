//! Local transcription port interface
//!
//! Used for the fast preliminary pass and for warming the model cache
//! without deploying a worker.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::job::JobId;
use crate::domain::transcript::Language;

/// Local transcription errors
#[derive(Debug, Clone, Error)]
pub enum LocalTranscribeError {
    #[error("engine failed to start: {0}")]
    SpawnFailed(String),

    #[error("engine failed: {0}")]
    EngineFailed(String),

    #[error("engine produced no transcript: {0}")]
    NoTranscript(String),
}

/// Port for running the transcription engine on the local host.
#[async_trait]
pub trait LocalTranscriber: Send + Sync {
    /// Run a fast, low-fidelity pass against the staged input.
    async fn transcribe(
        &self,
        input: &Path,
        language: &Language,
        job: &JobId,
    ) -> Result<String, LocalTranscribeError>;

    /// Touch the model artifacts so they stay resident in the shared cache.
    async fn warm_cache(&self) -> Result<(), LocalTranscribeError>;
}
