//! Admission control: FIFO queue, concurrency limiters, dispatch loop

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::domain::job::{Job, JobId, JobStatus, SubmitterId};

use super::runner::{self, RunnerDeps};

/// Concurrency limits enforced at admission.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerLimits {
    /// Bound on total concurrently running jobs (= worker count)
    pub global: usize,
    /// Bound on concurrently running jobs per submitter
    pub per_submitter: usize,
}

impl Default for SchedulerLimits {
    fn default() -> Self {
        Self {
            global: 1,
            per_submitter: 1,
        }
    }
}

/// Admission control for transcription jobs.
///
/// One explicitly-owned instance is shared by the dispatch loop, the cancel
/// path, and the cache warmer; nothing here is ambient state, so tests can
/// construct an isolated scheduler per case.
pub struct Scheduler {
    queue_tx: UnboundedSender<Arc<Job>>,
    queue_rx: tokio::sync::Mutex<UnboundedReceiver<Arc<Job>>>,
    queued: AtomicUsize,
    global: Arc<Semaphore>,
    per_submitter: Mutex<HashMap<SubmitterId, Arc<Semaphore>>>,
    limits: SchedulerLimits,
    jobs: Mutex<HashMap<JobId, Arc<Job>>>,
    tasks: Mutex<HashMap<JobId, JoinHandle<()>>>,
    /// Set on every successful dispatch and warm cycle; None until the first.
    last_activity: Mutex<Option<Instant>>,
    stop: Notify,
}

impl Scheduler {
    pub fn new(limits: SchedulerLimits) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        Self {
            queue_tx,
            queue_rx: tokio::sync::Mutex::new(queue_rx),
            queued: AtomicUsize::new(0),
            global: Arc::new(Semaphore::new(limits.global)),
            per_submitter: Mutex::new(HashMap::new()),
            limits,
            jobs: Mutex::new(HashMap::new()),
            tasks: Mutex::new(HashMap::new()),
            last_activity: Mutex::new(None),
            stop: Notify::new(),
        }
    }

    /// Register the job as live and append it to the queue. Never blocks.
    pub fn submit(&self, job: Arc<Job>) {
        self.jobs
            .lock()
            .expect("jobs lock poisoned")
            .insert(job.id.clone(), job.clone());
        self.queued.fetch_add(1, Ordering::SeqCst);
        // The receiver lives as long as the scheduler, so this cannot fail
        // while the scheduler is alive.
        let _ = self.queue_tx.send(job);
    }

    /// Current queue depth + 1: the position a job submitted right now would
    /// get. Advisory only, not a reservation.
    pub fn queue_position(&self) -> usize {
        self.queued.load(Ordering::SeqCst) + 1
    }

    pub fn queue_is_empty(&self) -> bool {
        self.queued.load(Ordering::SeqCst) == 0
    }

    /// Set the cancellation flag on a live job.
    ///
    /// The job stays in the queue and is skipped lazily when dequeued; an
    /// in-flight remote command is never interrupted.
    ///
    /// # Returns
    /// Whether a live job with that id was found.
    pub fn cancel(&self, id: &JobId) -> bool {
        match self.jobs.lock().expect("jobs lock poisoned").get(id) {
            Some(job) => {
                job.cancel.set();
                info!(job = %id, "cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Look up a live job by id.
    pub fn live_job(&self, id: &JobId) -> Option<Arc<Job>> {
        self.jobs.lock().expect("jobs lock poisoned").get(id).cloned()
    }

    pub fn live_job_count(&self) -> usize {
        self.jobs.lock().expect("jobs lock poisoned").len()
    }

    /// Record scheduling activity for the cache warmer's idle clock.
    pub fn mark_activity(&self) {
        *self.last_activity.lock().expect("activity lock poisoned") = Some(Instant::now());
    }

    /// Time since the last dispatch or warm cycle; `Duration::MAX` before the
    /// first one, so a fresh process is immediately considered idle.
    pub fn idle_for(&self) -> Duration {
        self.last_activity
            .lock()
            .expect("activity lock poisoned")
            .map(|at| at.elapsed())
            .unwrap_or(Duration::MAX)
    }

    /// Remove a job from the live-job and task tables. Called by each runner
    /// task for its own job only.
    pub(crate) fn forget(&self, id: &JobId) {
        self.jobs.lock().expect("jobs lock poisoned").remove(id);
        self.tasks.lock().expect("tasks lock poisoned").remove(id);
    }

    fn submitter_semaphore(&self, submitter: SubmitterId) -> Arc<Semaphore> {
        self.per_submitter
            .lock()
            .expect("semaphore lock poisoned")
            .entry(submitter)
            .or_insert_with(|| Arc::new(Semaphore::new(self.limits.per_submitter)))
            .clone()
    }

    /// Stop the dispatch loop after the current dequeue. Running jobs are not
    /// preempted.
    pub fn shutdown(&self) {
        self.stop.notify_one();
    }

    /// The dispatch loop.
    ///
    /// Dequeues jobs in FIFO order. Canceled jobs are reported and dropped
    /// without consuming a slot. Slot acquisition (global first, then
    /// per-submitter) blocks this single loop, so a job whose submitter slot
    /// is unavailable head-of-line-blocks everything behind it.
    pub async fn run(self: Arc<Self>, deps: Arc<RunnerDeps>) {
        let mut rx = self.queue_rx.lock().await;
        loop {
            let job = tokio::select! {
                biased;
                _ = self.stop.notified() => break,
                next = rx.recv() => match next {
                    Some(job) => job,
                    None => break,
                },
            };
            self.queued.fetch_sub(1, Ordering::SeqCst);

            if job.cancel.is_set() {
                debug!(job = %job.id, "skipping canceled job at dequeue");
                job.set_status(JobStatus::Canceled);
                runner::report_status(deps.messenger.as_ref(), &job, JobStatus::Canceled).await;
                runner::cleanup_staged_input(&job).await;
                self.jobs.lock().expect("jobs lock poisoned").remove(&job.id);
                continue;
            }

            let global = match self.global.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let submitter_sem = self.submitter_semaphore(job.submitter);
            let submitter = match submitter_sem.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            self.mark_activity();
            debug!(job = %job.id, "dispatching");
            let task = tokio::spawn(runner::run_job(
                deps.clone(),
                self.clone(),
                job.clone(),
                global,
                submitter,
            ));
            self.tasks
                .lock()
                .expect("tasks lock poisoned")
                .insert(job.id.clone(), task);
        }
        info!("dispatch loop stopped");
    }
}
