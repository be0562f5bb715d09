//! Per-job execution protocol
//!
//! One runner task per admitted job: provision a worker, connect with
//! retries, upload the input, run the remote transcription, fetch and
//! deliver the result, and tear everything down unconditionally.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OwnedSemaphorePermit;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::error::JobError;
use crate::domain::job::{sanitize_filename, Job, JobStatus};
use crate::domain::transcript::RunOutcome;

use super::delivery;
use super::ports::{quote, Messenger, RemoteChannel, RemoteSession, WorkerProvisioner};
use super::scheduler::Scheduler;

/// Path of the transcription engine on the worker image.
const REMOTE_ENGINE: &str = "/opt/scribe-fleet/engine";

/// Budget for best-effort remote cleanup during teardown.
const REMOTE_CLEANUP_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout budgets for one job's protocol.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Hard bound on total job duration from the transcription step onward
    pub job: Duration,
    /// Budget for establishing the first session against a booting worker
    pub connect_budget: Duration,
    /// Fixed interval between connect attempts
    pub connect_retry: Duration,
    /// Bound for short auxiliary remote commands
    pub command_idle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            job: Duration::from_secs(3 * 60 * 60),
            connect_budget: Duration::from_secs(90),
            connect_retry: Duration::from_secs(3),
            command_idle: Duration::from_secs(300),
        }
    }
}

/// Shared collaborators of every runner task.
pub struct RunnerDeps {
    pub messenger: Arc<dyn Messenger>,
    pub provisioner: Arc<dyn WorkerProvisioner>,
    pub remote: Arc<dyn RemoteChannel>,
    pub timeouts: Timeouts,
}

/// How a job's protocol ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Delivered,
    Canceled,
}

/// Execute one admitted job to its terminal state, then tear down.
///
/// Holds both concurrency permits for the task's whole lifetime; they are
/// released when this future completes, after the worker is destroyed.
pub async fn run_job(
    deps: Arc<RunnerDeps>,
    scheduler: Arc<Scheduler>,
    job: Arc<Job>,
    _global_slot: OwnedSemaphorePermit,
    _submitter_slot: OwnedSemaphorePermit,
) {
    let verdict = drive(&deps, &job).await;

    match &verdict {
        Ok(Verdict::Delivered) => {
            info!(job = %job.id, "job done");
            job.set_status(JobStatus::Done);
            report_status(deps.messenger.as_ref(), &job, JobStatus::Done).await;
        }
        Ok(Verdict::Canceled) => {
            info!(job = %job.id, "job canceled");
            job.set_status(JobStatus::Canceled);
            report_status(deps.messenger.as_ref(), &job, JobStatus::Canceled).await;
        }
        Err(err) => {
            warn!(job = %job.id, code = err.code(), "job failed: {err}");
            job.set_status(JobStatus::Failed);
            delivery::report_failure(deps.messenger.as_ref(), &job, err).await;
        }
    }

    // Unconditional teardown. Nothing below may mask the outcome above.
    cleanup_staged_input(&job).await;
    if let Some(binding) = job.worker() {
        deps.provisioner.destroy(&binding.name).await;
    }
    scheduler.forget(&job.id);
}

/// Provision, connect, and run the protocol, closing the session afterwards.
async fn drive(deps: &RunnerDeps, job: &Job) -> Result<Verdict, JobError> {
    // checkpoint: provisioning
    if job.cancel.is_set() {
        return Ok(Verdict::Canceled);
    }
    advance(deps, job, JobStatus::Provisioning).await;
    let name = job.id.worker_name();
    // bound before the attempt so teardown releases the worker even when
    // provisioning partially fails
    job.bind_worker(name.clone());
    let address = deps.provisioner.provision(&name).await?;
    info!(job = %job.id, worker = %name, %address, "worker provisioned");
    job.set_worker_address(address.clone());

    // checkpoint: connecting
    if job.cancel.is_set() {
        return Ok(Verdict::Canceled);
    }
    advance(deps, job, JobStatus::Connecting).await;
    let session = connect_with_retry(
        deps.remote.as_ref(),
        &address,
        deps.timeouts.connect_budget,
        deps.timeouts.connect_retry,
    )
    .await?;

    let result = protocol(deps, job, session.as_ref()).await;

    // Best-effort removal of the job's remote directories; failures here must
    // never overwrite the job's actual outcome.
    let cleanup = format!(
        "rm -rf /job/input/{id} /job/output/{id}",
        id = job.id
    );
    if let Err(err) = session.exec(&cleanup, REMOTE_CLEANUP_TIMEOUT).await {
        warn!(job = %job.id, "remote cleanup failed: {err}");
    }
    session.close().await;

    result
}

/// Upload, transcribe, fetch, deliver.
async fn protocol(
    deps: &RunnerDeps,
    job: &Job,
    session: &dyn RemoteSession,
) -> Result<Verdict, JobError> {
    // checkpoint: uploading
    if job.cancel.is_set() {
        return Ok(Verdict::Canceled);
    }
    advance(deps, job, JobStatus::Uploading).await;
    let input_dir = format!("/job/input/{}", job.id);
    let output_dir = format!("/job/output/{}", job.id);
    session
        .exec(
            &format!("mkdir -p {input_dir} {output_dir} /job/logs"),
            deps.timeouts.command_idle,
        )
        .await?;
    let remote_input = format!("{input_dir}/{}", sanitize_filename(&job.original_filename));
    session.upload(&job.input_path, &remote_input).await?;

    // checkpoint: transcribing
    if job.cancel.is_set() {
        return Ok(Verdict::Canceled);
    }
    advance(deps, job, JobStatus::Transcribing).await;
    let deadline = Instant::now() + deps.timeouts.job;
    let command = format!(
        "{REMOTE_ENGINE} --in {} --model {} --language {} --job-id {}",
        quote(&remote_input),
        quote(job.model.as_str()),
        quote(job.language.as_str()),
        quote(job.id.as_str()),
    );
    let stdout = match session.exec(&command, deps.timeouts.job).await {
        Ok(out) => out,
        Err(super::ports::RemoteError::TimedOut(_)) => return Err(JobError::OverallTimeout),
        Err(err) => return Err(err.into()),
    };
    let outcome = RunOutcome::parse(&stdout)?;
    if !outcome.ok {
        return Err(outcome.engine_error());
    }
    let text_path = outcome
        .text_path
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| JobError::MalformedResult("result carries no text_path".to_string()))?
        .to_string();

    // checkpoint: fetching
    if job.cancel.is_set() {
        return Ok(Verdict::Canceled);
    }
    if Instant::now() >= deadline {
        return Err(JobError::OverallTimeout);
    }
    advance(deps, job, JobStatus::Fetching).await;
    let transcript = session
        .exec(&format!("cat {}", quote(&text_path)), deps.timeouts.command_idle)
        .await?;

    advance(deps, job, JobStatus::Delivering).await;
    delivery::deliver_transcript(deps.messenger.as_ref(), job, &transcript)
        .await
        .map_err(|err| JobError::Internal(format!("delivery failed: {err}")))?;

    Ok(Verdict::Delivered)
}

/// Open a session against a freshly provisioned worker, retrying at a fixed
/// interval while it boots. Exceeding the budget is fatal for the job.
pub async fn connect_with_retry(
    remote: &dyn RemoteChannel,
    address: &str,
    budget: Duration,
    interval: Duration,
) -> Result<Box<dyn RemoteSession>, JobError> {
    let start = Instant::now();
    let mut last_err = None;
    while start.elapsed() < budget {
        match remote.connect(address).await {
            Ok(session) => return Ok(session),
            Err(err) => {
                debug!(%address, "connect attempt failed: {err}");
                last_err = Some(err);
            }
        }
        tokio::time::sleep(interval).await;
    }
    warn!(%address, "connect budget exhausted, last error: {last_err:?}");
    Err(JobError::ConnectTimeout(address.to_string()))
}

/// Move the job to `status` and mirror it into the in-place status message.
async fn advance(deps: &RunnerDeps, job: &Job, status: JobStatus) {
    job.set_status(status);
    report_status(deps.messenger.as_ref(), job, status).await;
}

/// Edit the job's status message; edit failures are logged, never fatal.
pub(crate) async fn report_status(messenger: &dyn Messenger, job: &Job, status: JobStatus) {
    let Some(message) = job.status_message else {
        return;
    };
    if let Err(err) = messenger
        .edit_message(job.chat, message, status.progress_label())
        .await
    {
        warn!(job = %job.id, "failed to edit status message: {err}");
    }
}

/// Remove the staged input file and its job-scoped temp directory.
pub(crate) async fn cleanup_staged_input(job: &Job) {
    if let Err(err) = tokio::fs::remove_file(&job.input_path).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(job = %job.id, "failed to remove staged input: {err}");
        }
    }
    // input file lives in <tmp>/<job-id>/input/<name>; drop the whole job dir
    if let Some(job_dir) = job.input_path.parent().and_then(|p| p.parent()) {
        if let Err(err) = tokio::fs::remove_dir_all(job_dir).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(job = %job.id, "failed to remove job temp dir: {err}");
            }
        }
    }
}
