//! Job entity and lifecycle state

pub mod status;

pub use status::JobStatus;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::domain::transcript::{Language, ModelTier};

/// Submitter identity in the chat transport
pub type SubmitterId = i64;
/// Conversation identity in the chat transport
pub type ChatId = i64;
/// Message handle in the chat transport
pub type MessageId = i64;

/// Name prefix shared by all workers, used for leftover cleanup at startup.
pub const WORKER_NAME_PREFIX: &str = "wkr";

/// Unique identifier of a transcription job, fixed for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the worker bound to this job, derived deterministically so
    /// that leftover workers can be traced back and cleaned up.
    pub fn worker_name(&self) -> String {
        format!("{}{}", WORKER_NAME_PREFIX, &self.0[..8])
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

/// Set-once cooperative cancellation flag.
///
/// Observed at defined checkpoints in the job runner; never cleared.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runtime binding of a job to its worker.
///
/// The name is bound before provisioning starts so teardown can release the
/// worker even when provisioning itself partially failed; the address
/// appears once provisioning succeeds.
#[derive(Debug, Clone)]
pub struct WorkerBinding {
    pub name: String,
    pub address: Option<String>,
}

/// One transcription request and its mutable execution state.
///
/// A job is owned by exactly one runner task for the duration of its
/// execution; the only fields touched from outside that task are the cancel
/// flag and the read-only descriptor fields.
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    pub submitter: SubmitterId,
    pub username: Option<String>,
    pub chat: ChatId,
    /// Originating request message, used as the reply target
    pub origin_message: MessageId,
    /// Locally staged input file
    pub input_path: PathBuf,
    pub original_filename: String,
    pub model: ModelTier,
    pub language: Language,
    /// In-place progress message, edited as the job advances
    pub status_message: Option<MessageId>,
    /// Preliminary-transcript message, present only for preview-capable jobs
    pub preliminary_message: Option<MessageId>,
    pub cancel: CancelFlag,
    status: Mutex<JobStatus>,
    worker: Mutex<Option<WorkerBinding>>,
}

impl Job {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: JobId,
        submitter: SubmitterId,
        username: Option<String>,
        chat: ChatId,
        origin_message: MessageId,
        input_path: PathBuf,
        original_filename: String,
        model: ModelTier,
        language: Language,
    ) -> Self {
        Self {
            id,
            submitter,
            username,
            chat,
            origin_message,
            input_path,
            original_filename,
            model,
            language,
            status_message: None,
            preliminary_message: None,
            cancel: CancelFlag::new(),
            status: Mutex::new(JobStatus::Queued),
            worker: Mutex::new(None),
        }
    }

    pub fn status(&self) -> JobStatus {
        *self.status.lock().expect("status lock poisoned")
    }

    pub fn set_status(&self, status: JobStatus) {
        *self.status.lock().expect("status lock poisoned") = status;
    }

    /// Record the worker name ahead of provisioning. Set once by the runner
    /// task.
    pub fn bind_worker(&self, name: String) {
        *self.worker.lock().expect("worker lock poisoned") = Some(WorkerBinding {
            name,
            address: None,
        });
    }

    /// Record the provisioned worker's address.
    pub fn set_worker_address(&self, address: String) {
        if let Some(binding) = self.worker.lock().expect("worker lock poisoned").as_mut() {
            binding.address = Some(address);
        }
    }

    pub fn worker(&self) -> Option<WorkerBinding> {
        self.worker.lock().expect("worker lock poisoned").clone()
    }
}

/// Make a filename safe for use in a remote shell path.
pub fn sanitize_filename(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    safe.chars().take(128).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_job() -> Job {
        Job::new(
            JobId::new(),
            42,
            Some("alice".to_string()),
            -100,
            7,
            PathBuf::from("/tmp/in/audio.ogg"),
            "audio.ogg".to_string(),
            ModelTier::Turbo,
            Language::auto(),
        )
    }

    #[test]
    fn job_ids_are_unique() {
        assert_ne!(JobId::new().as_str(), JobId::new().as_str());
    }

    #[test]
    fn worker_name_is_prefixed_and_deterministic() {
        let id = JobId::new();
        let name = id.worker_name();
        assert!(name.starts_with(WORKER_NAME_PREFIX));
        assert_eq!(name, id.worker_name());
        assert_eq!(name.len(), WORKER_NAME_PREFIX.len() + 8);
    }

    #[test]
    fn cancel_flag_is_sticky() {
        let flag = CancelFlag::new();
        assert!(!flag.is_set());
        flag.set();
        assert!(flag.is_set());
        flag.set();
        assert!(flag.is_set());
    }

    #[test]
    fn cancel_flag_is_shared_across_clones() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        other.set();
        assert!(flag.is_set());
    }

    #[test]
    fn new_job_starts_queued() {
        let job = test_job();
        assert_eq!(job.status(), JobStatus::Queued);
        assert!(job.worker().is_none());
    }

    #[test]
    fn bind_worker_records_name_then_address() {
        let job = test_job();
        job.bind_worker("wkrabc12345".to_string());
        let binding = job.worker().unwrap();
        assert_eq!(binding.name, "wkrabc12345");
        assert!(binding.address.is_none());

        job.set_worker_address("10.1.2.3".to_string());
        assert_eq!(job.worker().unwrap().address.as_deref(), Some("10.1.2.3"));
    }

    #[test]
    fn sanitize_keeps_safe_characters() {
        assert_eq!(sanitize_filename("voice-12.ogg"), "voice-12.ogg");
        assert_eq!(sanitize_filename("my file (1).mp3"), "my_file__1_.mp3");
        assert_eq!(sanitize_filename("ün?code"), "_n_code");
    }

    #[test]
    fn sanitize_caps_length() {
        let long = "a".repeat(300);
        assert_eq!(sanitize_filename(&long).len(), 128);
    }
}
