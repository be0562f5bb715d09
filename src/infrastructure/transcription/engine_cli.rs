//! Local transcription engine adapter
//!
//! Runs the same engine binary the workers carry, against the local host.
//! Used for the fast preliminary pass (always on the tiny tier) and for
//! warming the model cache without deploying a worker.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::application::ports::{LocalTranscribeError, LocalTranscriber};
use crate::domain::job::JobId;
use crate::domain::transcript::{Language, ModelTier, RunOutcome};

/// Engine CLI adapter
pub struct EngineCliTranscriber {
    engine: PathBuf,
    warm_command: PathBuf,
    /// Root for per-job output and log directories
    work_root: PathBuf,
}

impl EngineCliTranscriber {
    pub fn new(
        engine: impl Into<PathBuf>,
        warm_command: impl Into<PathBuf>,
        work_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            engine: engine.into(),
            warm_command: warm_command.into(),
            work_root: work_root.into(),
        }
    }
}

#[async_trait]
impl LocalTranscriber for EngineCliTranscriber {
    async fn transcribe(
        &self,
        input: &Path,
        language: &Language,
        job: &JobId,
    ) -> Result<String, LocalTranscribeError> {
        let job_dir = self.work_root.join(job.as_str());
        let out_dir = job_dir.join("output");
        let log_dir = job_dir.join("logs");
        for dir in [&out_dir, &log_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| LocalTranscribeError::SpawnFailed(e.to_string()))?;
        }

        debug!(job = %job, engine = %self.engine.display(), "running local fast pass");
        let output = Command::new(&self.engine)
            .arg("--in")
            .arg(input)
            .args(["--model", ModelTier::Tiny.as_str()])
            .args(["--language", language.as_str()])
            .args(["--job-id", job.as_str()])
            .env("JOB_ID", job.as_str())
            .env("OUT_ROOT", &out_dir)
            .env("LOG_DIR", &log_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| LocalTranscribeError::SpawnFailed(e.to_string()))?;

        if !output.status.success() {
            return Err(LocalTranscribeError::EngineFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let outcome = RunOutcome::parse(&stdout)
            .map_err(|e| LocalTranscribeError::EngineFailed(e.to_string()))?;
        if !outcome.ok {
            return Err(LocalTranscribeError::EngineFailed(
                outcome.error.unwrap_or_else(|| "unknown".to_string()),
            ));
        }
        let text_path = outcome
            .text_path
            .filter(|p| !p.is_empty())
            .ok_or_else(|| LocalTranscribeError::NoTranscript("no text_path".to_string()))?;

        tokio::fs::read_to_string(&text_path)
            .await
            .map_err(|e| LocalTranscribeError::NoTranscript(e.to_string()))
    }

    async fn warm_cache(&self) -> Result<(), LocalTranscribeError> {
        let status = Command::new(&self.warm_command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| LocalTranscribeError::SpawnFailed(e.to_string()))?;
        if !status.success() {
            return Err(LocalTranscribeError::EngineFailed(format!(
                "warm command exited with status: {status}"
            )));
        }
        Ok(())
    }
}
