//! End-to-end job lifecycle tests
//!
//! Drive the scheduler and runner against scriptable in-memory adapters:
//! worker provisioning, the remote execution channel, and the chat
//! transport are all mocked so whole-job scenarios run in milliseconds.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use scribe_fleet::application::ports::{
    Messenger, MessengerError, ProvisionError, RemoteChannel, RemoteError, RemoteSession,
    WorkerProvisioner,
};
use scribe_fleet::application::{RunnerDeps, Scheduler, SchedulerLimits, Timeouts};
use scribe_fleet::domain::job::{Job, JobId, JobStatus, SubmitterId};
use scribe_fleet::domain::transcript::{Language, ModelTier};

// ---------------------------------------------------------------------------
// mock adapters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Outgoing {
    Sent(String),
    Edited(String),
}

#[derive(Default)]
struct MockMessenger {
    log: Mutex<Vec<Outgoing>>,
    next_id: AtomicI64,
}

impl MockMessenger {
    fn texts(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .map(|o| match o {
                Outgoing::Sent(t) | Outgoing::Edited(t) => t.clone(),
            })
            .collect()
    }

    fn sent(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter_map(|o| match o {
                Outgoing::Sent(t) => Some(t.clone()),
                Outgoing::Edited(_) => None,
            })
            .collect()
    }

    fn last_edit(&self) -> Option<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|o| match o {
                Outgoing::Edited(t) => Some(t.clone()),
                Outgoing::Sent(_) => None,
            })
    }
}

#[async_trait]
impl Messenger for MockMessenger {
    async fn send_message(
        &self,
        _chat: i64,
        text: &str,
        _reply_to: Option<i64>,
    ) -> Result<i64, MessengerError> {
        self.log.lock().unwrap().push(Outgoing::Sent(text.to_string()));
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 100)
    }

    async fn send_cancellable(
        &self,
        chat: i64,
        text: &str,
        reply_to: Option<i64>,
        _job: &JobId,
    ) -> Result<i64, MessengerError> {
        self.send_message(chat, text, reply_to).await
    }

    async fn edit_message(
        &self,
        _chat: i64,
        _message: i64,
        text: &str,
    ) -> Result<(), MessengerError> {
        self.log.lock().unwrap().push(Outgoing::Edited(text.to_string()));
        Ok(())
    }

    async fn send_document(
        &self,
        _chat: i64,
        _bytes: Vec<u8>,
        filename: &str,
        _caption: &str,
        _reply_to: Option<i64>,
    ) -> Result<(), MessengerError> {
        self.log
            .lock()
            .unwrap()
            .push(Outgoing::Sent(format!("document:{filename}")));
        Ok(())
    }
}

#[derive(Default)]
struct MockProvisioner {
    fail: bool,
    provisions: Mutex<Vec<String>>,
    destroys: Mutex<Vec<String>>,
    counter: AtomicUsize,
}

impl MockProvisioner {
    fn provisioned(&self) -> Vec<String> {
        self.provisions.lock().unwrap().clone()
    }

    fn destroy_count(&self, name: &str) -> usize {
        self.destroys
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.as_str() == name)
            .count()
    }
}

#[async_trait]
impl WorkerProvisioner for MockProvisioner {
    async fn provision(&self, name: &str) -> Result<String, ProvisionError> {
        self.provisions.lock().unwrap().push(name.to_string());
        if self.fail {
            return Err(ProvisionError::Backend("no capacity".to_string()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("10.0.0.{n}"))
    }

    async fn destroy(&self, name: &str) {
        // tolerant of repeats and never-provisioned names
        self.destroys.lock().unwrap().push(name.to_string());
    }

    async fn list_active(&self) -> Result<Vec<String>, ProvisionError> {
        Ok(self.provisions.lock().unwrap().clone())
    }
}

/// Remote channel whose sessions answer from a script. The transcription
/// command optionally blocks on a gate so tests can hold a job inside the
/// Transcribing state.
struct ScriptedChannel {
    connect_failures: AtomicUsize,
    engine_result: String,
    transcript: String,
    gate: Option<Arc<tokio::sync::Semaphore>>,
    commands: Arc<Mutex<Vec<String>>>,
}

impl ScriptedChannel {
    fn new(engine_result: &str, transcript: &str) -> Self {
        Self {
            connect_failures: AtomicUsize::new(0),
            engine_result: engine_result.to_string(),
            transcript: transcript.to_string(),
            gate: None,
            commands: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn failing_first(mut self, failures: usize) -> Self {
        self.connect_failures = AtomicUsize::new(failures);
        self
    }

    fn gated(mut self, gate: Arc<tokio::sync::Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    fn ran_engine(&self) -> bool {
        self.commands().iter().any(|c| c.contains("--job-id"))
    }

    fn fetched_transcript(&self) -> bool {
        self.commands().iter().any(|c| c.starts_with("cat "))
    }
}

#[async_trait]
impl RemoteChannel for ScriptedChannel {
    async fn connect(&self, address: &str) -> Result<Box<dyn RemoteSession>, RemoteError> {
        let remaining = self
            .connect_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if remaining {
            return Err(RemoteError::Unreachable(address.to_string()));
        }
        Ok(Box::new(ScriptedSession {
            engine_result: self.engine_result.clone(),
            transcript: self.transcript.clone(),
            gate: self.gate.clone(),
            commands: self.commands.clone(),
        }))
    }
}

struct ScriptedSession {
    engine_result: String,
    transcript: String,
    gate: Option<Arc<tokio::sync::Semaphore>>,
    commands: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl RemoteSession for ScriptedSession {
    async fn exec(&self, command: &str, _timeout: Duration) -> Result<String, RemoteError> {
        self.commands.lock().unwrap().push(command.to_string());
        if command.contains("--job-id") {
            if let Some(gate) = &self.gate {
                gate.acquire().await.expect("gate closed").forget();
            }
            return Ok(self.engine_result.clone());
        }
        if command.starts_with("cat ") {
            return Ok(self.transcript.clone());
        }
        Ok(String::new())
    }

    async fn upload(&self, _local: &std::path::Path, _remote: &str) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn close(&self) {}
}

// ---------------------------------------------------------------------------
// harness
// ---------------------------------------------------------------------------

const OK_RESULT: &str =
    "{\"ok\": true, \"text_path\": \"/job/output/X/transcript.txt\", \"chars\": 42}";

struct World {
    scheduler: Arc<Scheduler>,
    messenger: Arc<MockMessenger>,
    provisioner: Arc<MockProvisioner>,
    channel: Arc<ScriptedChannel>,
    tmp: tempfile::TempDir,
}

impl World {
    fn new(limits: SchedulerLimits, provisioner: MockProvisioner, channel: ScriptedChannel) -> Self {
        let messenger = Arc::new(MockMessenger::default());
        let provisioner = Arc::new(provisioner);
        let channel = Arc::new(channel);
        let scheduler = Arc::new(Scheduler::new(limits));
        let deps = Arc::new(RunnerDeps {
            messenger: messenger.clone(),
            provisioner: provisioner.clone(),
            remote: channel.clone(),
            timeouts: Timeouts {
                job: Duration::from_secs(10),
                connect_budget: Duration::from_millis(500),
                connect_retry: Duration::from_millis(10),
                command_idle: Duration::from_secs(10),
            },
        });
        let _ = tokio::spawn(scheduler.clone().run(deps));
        Self {
            scheduler,
            messenger,
            provisioner,
            channel,
            tmp: tempfile::tempdir().expect("tempdir"),
        }
    }

    fn make_job(&self, submitter: SubmitterId) -> Arc<Job> {
        let id = JobId::new();
        let input_dir = self.tmp.path().join(id.as_str()).join("input");
        std::fs::create_dir_all(&input_dir).expect("staging dir");
        let input_path = input_dir.join("voice.ogg");
        std::fs::write(&input_path, b"opus bytes").expect("staged input");

        let mut job = Job::new(
            id,
            submitter,
            None,
            10,
            20,
            input_path,
            "voice.ogg".to_string(),
            ModelTier::Turbo,
            Language::auto(),
        );
        job.status_message = Some(1);
        Arc::new(job)
    }

    async fn wait_terminal(&self, job: &Arc<Job>) {
        let deadline = Duration::from_secs(5);
        tokio::time::timeout(deadline, async {
            loop {
                if job.status().is_terminal() && self.scheduler.live_job(&job.id).is_none() {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("job did not reach a terminal state in time");
    }

    async fn wait_status(&self, job: &Arc<Job>, status: JobStatus) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if job.status() == status {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("job never reached {status}"));
    }
}

// ---------------------------------------------------------------------------
// scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn successful_job_connects_on_second_attempt_and_delivers() {
    let world = World::new(
        SchedulerLimits::default(),
        MockProvisioner::default(),
        ScriptedChannel::new(OK_RESULT, "the transcribed text").failing_first(1),
    );

    let job = world.make_job(1);
    world.scheduler.submit(job.clone());
    world.wait_terminal(&job).await;

    assert_eq!(job.status(), JobStatus::Done);
    assert_eq!(world.messenger.last_edit().as_deref(), Some("Done ✅"));
    // delivered text matches the remote file contents
    assert!(world
        .messenger
        .sent()
        .iter()
        .any(|t| t == "the transcribed text"));
    assert!(world.channel.fetched_transcript());

    // the worker was destroyed exactly once
    let worker = job.id.worker_name();
    assert_eq!(world.provisioner.provisioned(), vec![worker.clone()]);
    assert_eq!(world.provisioner.destroy_count(&worker), 1);
    // the staged input is gone and nothing is tracked anymore
    assert!(!job.input_path.exists());
    assert_eq!(world.scheduler.live_job_count(), 0);
}

#[tokio::test]
async fn engine_failure_is_surfaced_and_worker_destroyed() {
    let world = World::new(
        SchedulerLimits::default(),
        MockProvisioner::default(),
        ScriptedChannel::new(
            "{\"ok\": false, \"error\": \"E_FFMPEG_TIMEOUT: conversion timed out\"}",
            "",
        ),
    );

    let job = world.make_job(1);
    world.scheduler.submit(job.clone());
    world.wait_terminal(&job).await;

    assert_eq!(job.status(), JobStatus::Failed);
    let failure = world.messenger.last_edit().expect("failure edit");
    assert!(failure.starts_with("Failed ❌"));
    assert!(failure.contains("conversion timed out"));
    assert!(!world.channel.fetched_transcript());
    assert_eq!(world.provisioner.destroy_count(&job.id.worker_name()), 1);
}

#[tokio::test]
async fn per_submitter_limit_serializes_a_submitters_jobs() {
    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let world = World::new(
        SchedulerLimits {
            global: 2,
            per_submitter: 1,
        },
        MockProvisioner::default(),
        ScriptedChannel::new(OK_RESULT, "text").gated(gate.clone()),
    );

    let first = world.make_job(7);
    let second = world.make_job(7);
    world.scheduler.submit(first.clone());
    world.scheduler.submit(second.clone());

    world.wait_status(&first, JobStatus::Transcribing).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // the second job has not entered provisioning while the first runs
    assert_eq!(world.provisioner.provisioned().len(), 1);
    assert_eq!(second.status(), JobStatus::Queued);

    gate.add_permits(2);
    world.wait_terminal(&first).await;
    world.wait_terminal(&second).await;

    assert_eq!(first.status(), JobStatus::Done);
    assert_eq!(second.status(), JobStatus::Done);
    assert_eq!(world.provisioner.provisioned().len(), 2);
}

#[tokio::test]
async fn cancel_during_transcribing_lets_the_command_finish_then_stops() {
    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let world = World::new(
        SchedulerLimits::default(),
        MockProvisioner::default(),
        ScriptedChannel::new(OK_RESULT, "text").gated(gate.clone()),
    );

    let job = world.make_job(1);
    world.scheduler.submit(job.clone());
    world.wait_status(&job, JobStatus::Transcribing).await;

    assert!(world.scheduler.cancel(&job.id));
    // the in-flight remote command is never interrupted
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(job.status(), JobStatus::Transcribing);

    gate.add_permits(1);
    world.wait_terminal(&job).await;

    assert_eq!(job.status(), JobStatus::Canceled);
    assert_eq!(world.messenger.last_edit().as_deref(), Some("Canceled"));
    // no further protocol steps after the checkpoint
    assert!(world.channel.ran_engine());
    assert!(!world.channel.fetched_transcript());
    assert_eq!(world.provisioner.destroy_count(&job.id.worker_name()), 1);
}

#[tokio::test]
async fn job_canceled_while_queued_never_takes_a_slot() {
    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let world = World::new(
        SchedulerLimits {
            global: 1,
            per_submitter: 1,
        },
        MockProvisioner::default(),
        ScriptedChannel::new(OK_RESULT, "text").gated(gate.clone()),
    );

    let running = world.make_job(1);
    let queued = world.make_job(2);
    world.scheduler.submit(running.clone());
    world.scheduler.submit(queued.clone());

    world.wait_status(&running, JobStatus::Transcribing).await;
    assert!(world.scheduler.cancel(&queued.id));

    gate.add_permits(1);
    world.wait_terminal(&running).await;
    world.wait_terminal(&queued).await;

    assert_eq!(queued.status(), JobStatus::Canceled);
    // never provisioned, so its worker never existed
    assert_eq!(
        world.provisioner.provisioned(),
        vec![running.id.worker_name()]
    );
    assert!(!queued.input_path.exists());
}

#[tokio::test]
async fn connect_budget_exhaustion_fails_without_running_the_engine() {
    let world = World::new(
        SchedulerLimits::default(),
        MockProvisioner::default(),
        ScriptedChannel::new(OK_RESULT, "text").failing_first(usize::MAX),
    );

    let job = world.make_job(1);
    world.scheduler.submit(job.clone());
    world.wait_terminal(&job).await;

    assert_eq!(job.status(), JobStatus::Failed);
    let failure = world.messenger.last_edit().expect("failure edit");
    assert!(failure.contains("timed out connecting"));
    // no transcription command was ever issued
    assert!(!world.channel.ran_engine());
    assert_eq!(world.provisioner.destroy_count(&job.id.worker_name()), 1);
}

#[tokio::test]
async fn provisioning_failure_is_fatal_and_still_releases_the_worker() {
    let world = World::new(
        SchedulerLimits::default(),
        MockProvisioner {
            fail: true,
            ..Default::default()
        },
        ScriptedChannel::new(OK_RESULT, "text"),
    );

    let job = world.make_job(1);
    world.scheduler.submit(job.clone());
    world.wait_terminal(&job).await;

    assert_eq!(job.status(), JobStatus::Failed);
    let failure = world.messenger.last_edit().expect("failure edit");
    assert!(failure.contains("provisioning failed"));
    // release is attempted even though provisioning failed
    assert_eq!(world.provisioner.destroy_count(&job.id.worker_name()), 1);
}

#[tokio::test]
async fn oversized_transcript_is_truncated_and_attached() {
    let long_text = "a".repeat(scribe_fleet::application::ports::DEFAULT_TEXT_LIMIT + 50);
    let world = World::new(
        SchedulerLimits::default(),
        MockProvisioner::default(),
        ScriptedChannel::new(OK_RESULT, &long_text),
    );

    let job = world.make_job(1);
    world.scheduler.submit(job.clone());
    world.wait_terminal(&job).await;

    assert_eq!(job.status(), JobStatus::Done);
    let texts = world.messenger.texts();
    assert!(texts
        .iter()
        .any(|t| t.starts_with("document:transcript-") && t.ends_with(".txt")));
    // the in-place message carries the clipped text, not the full transcript
    assert!(world
        .messenger
        .sent()
        .iter()
        .any(|t| t.len() == scribe_fleet::application::ports::DEFAULT_TEXT_LIMIT));
}

#[tokio::test]
async fn destroy_is_idempotent_from_the_callers_perspective() {
    let provisioner = MockProvisioner::default();
    provisioner.provision("wkrfeed1234").await.expect("provision");
    provisioner.destroy("wkrfeed1234").await;
    provisioner.destroy("wkrfeed1234").await;
    // and destroying something never provisioned is tolerated too
    provisioner.destroy("wkrnothere").await;
    assert_eq!(provisioner.destroy_count("wkrfeed1234"), 2);
}
