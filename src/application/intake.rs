//! Inbound request handling
//!
//! Normalizes chat updates into the operations this service exposes:
//! submitting a transcription request, querying and changing per-submitter
//! preferences, and canceling a job.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::config::AccessPolicy;
use crate::domain::job::{
    sanitize_filename, ChatId, Job, JobId, MessageId, SubmitterId,
};
use crate::domain::transcript::{Language, ModelTier};

use super::ports::{
    AttachmentRef, InboundUpdate, InputStager, LocalTranscriber, Messenger, PreferenceStore,
    Preferences, UpdateSource,
};
use super::preliminary::spawn_preliminary;
use super::scheduler::Scheduler;

const ACCESS_DENIED: &str = "Access denied.";
const UNSUPPORTED: &str = "I can't process that message. Please send an audio or video file.";
const HELP_TEXT: &str = "Hi! Send me an audio or video, and I'll transcribe it.\n\
Commands:\n\
/model <tiny|turbo>\n\
/language <auto|en|es|de|...>\n\
/settings to view your current settings.";

/// Wait before polling again after a transport error.
const POLL_FAILURE_BACKOFF: Duration = Duration::from_secs(5);

/// Inbound request handler, shared by the gateway loop.
pub struct Intake {
    pub scheduler: Arc<Scheduler>,
    pub messenger: Arc<dyn Messenger>,
    pub stager: Arc<dyn InputStager>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub local: Arc<dyn LocalTranscriber>,
    pub policy: AccessPolicy,
    pub defaults: Preferences,
    pub tmp_dir: PathBuf,
}

impl Intake {
    pub async fn handle(&self, update: InboundUpdate) {
        match update {
            InboundUpdate::Media {
                chat,
                message,
                submitter,
                username,
                attachment,
            } => {
                self.handle_media(chat, message, submitter, username, attachment)
                    .await
            }
            InboundUpdate::Command {
                chat,
                message,
                submitter,
                username,
                name,
                arg,
            } => {
                self.handle_command(chat, message, submitter, username.as_deref(), &name, arg)
                    .await
            }
            InboundUpdate::CancelRequest { submitter, job_id } => {
                self.handle_cancel(submitter, &job_id).await
            }
            InboundUpdate::Unsupported {
                chat,
                message,
                submitter,
                username,
            } => {
                let text = if self.policy.allows(submitter, username.as_deref()) {
                    UNSUPPORTED
                } else {
                    ACCESS_DENIED
                };
                self.reply(chat, text, message).await;
            }
        }
    }

    async fn handle_media(
        &self,
        chat: ChatId,
        message: MessageId,
        submitter: SubmitterId,
        username: Option<String>,
        attachment: AttachmentRef,
    ) {
        if !self.policy.allows(submitter, username.as_deref()) {
            self.reply(chat, ACCESS_DENIED, message).await;
            return;
        }

        let prefs = self.preferences_for(submitter).await;
        let id = JobId::new();
        let input_dir = self.tmp_dir.join(id.as_str()).join("input");
        if let Err(err) = tokio::fs::create_dir_all(&input_dir).await {
            warn!(job = %id, "failed to create staging dir: {err}");
            self.reply(chat, "An internal error occurred while processing your file.", message)
                .await;
            return;
        }
        let local_path = input_dir.join(sanitize_filename(&attachment.filename));

        // One status message per job, edited in place from here on. The
        // cancel control carries the job id from the start.
        let status_message = match self
            .messenger
            .send_cancellable(chat, "Downloading…", Some(message), &id)
            .await
        {
            Ok(mid) => Some(mid),
            Err(err) => {
                warn!(job = %id, "failed to send status message: {err}");
                None
            }
        };

        if let Err(err) = self.stager.stage(&attachment, &local_path).await {
            warn!(job = %id, "staging failed: {err}");
            if let Some(mid) = status_message {
                let _ = self
                    .messenger
                    .edit_message(chat, mid, "Failed ❌\nFailed to download the file.")
                    .await;
            }
            let _ = tokio::fs::remove_dir_all(self.tmp_dir.join(id.as_str())).await;
            return;
        }

        let mut job = Job::new(
            id,
            submitter,
            username,
            chat,
            message,
            local_path,
            attachment.filename,
            prefs.model,
            prefs.language,
        );
        job.status_message = status_message;

        if job.model.supports_preview() {
            match self
                .messenger
                .send_message(
                    chat,
                    "Generating preliminary transcript (fast pass)…",
                    Some(message),
                )
                .await
            {
                Ok(mid) => job.preliminary_message = Some(mid),
                Err(err) => warn!(job = %job.id, "failed to send preliminary message: {err}"),
            }
        }

        let job = Arc::new(job);
        if job.preliminary_message.is_some() {
            // best-effort and detached; the main job never waits for it
            let _ = spawn_preliminary(self.messenger.clone(), self.local.clone(), job.clone());
        }

        let position = self.scheduler.queue_position();
        if let Some(mid) = job.status_message {
            if let Err(err) = self
                .messenger
                .edit_message(chat, mid, &format!("Queued (position {position})"))
                .await
            {
                warn!(job = %job.id, "failed to edit status message: {err}");
            }
        }
        self.scheduler.submit(job);
    }

    async fn handle_command(
        &self,
        chat: ChatId,
        message: MessageId,
        submitter: SubmitterId,
        username: Option<&str>,
        name: &str,
        arg: Option<String>,
    ) {
        if !self.policy.allows(submitter, username) {
            self.reply(chat, ACCESS_DENIED, message).await;
            return;
        }

        match name {
            "start" | "help" => self.reply(chat, HELP_TEXT, message).await,
            "settings" => {
                let prefs = self.preferences_for(submitter).await;
                let text = format!(
                    "Your settings:\n- Model: {}\n- Language: {}",
                    prefs.model, prefs.language
                );
                self.reply(chat, &text, message).await;
            }
            "model" => match arg.as_deref().map(str::parse::<ModelTier>) {
                Some(Ok(model)) => {
                    if let Err(err) = self.preferences.set_model(submitter, model).await {
                        warn!(%submitter, "failed to store model preference: {err}");
                        self.reply(chat, "Failed to save your preference.", message).await;
                    } else {
                        self.reply(chat, &format!("Model set to: {model}"), message).await;
                    }
                }
                Some(Err(err)) => self.reply(chat, &err.to_string(), message).await,
                None => self.reply(chat, "Usage: /model <tiny|turbo>", message).await,
            },
            "language" => match arg.as_deref().map(str::parse::<Language>) {
                Some(Ok(language)) => {
                    if let Err(err) = self.preferences.set_language(submitter, language.clone()).await
                    {
                        warn!(%submitter, "failed to store language preference: {err}");
                        self.reply(chat, "Failed to save your preference.", message).await;
                    } else {
                        self.reply(chat, &format!("Language set to: {language}"), message).await;
                    }
                }
                Some(Err(err)) => self.reply(chat, &err.to_string(), message).await,
                None => self.reply(chat, "Usage: /language <auto|code>", message).await,
            },
            other => debug!(command = other, "ignoring unknown command"),
        }
    }

    async fn handle_cancel(&self, submitter: SubmitterId, job_id: &str) {
        let id: JobId = match job_id.parse() {
            Ok(id) => id,
            Err(_) => return,
        };
        let Some(job) = self.scheduler.live_job(&id) else {
            debug!(job = %id, "cancel requested for unknown job");
            return;
        };
        // Only the original submitter may cancel
        if job.submitter != submitter {
            debug!(job = %id, %submitter, "ignoring cancel from non-owner");
            return;
        }
        if self.scheduler.cancel(&id) {
            if let Some(mid) = job.status_message {
                let _ = self.messenger.edit_message(job.chat, mid, "Canceling…").await;
            }
        }
    }

    async fn preferences_for(&self, submitter: SubmitterId) -> Preferences {
        match self.preferences.get(submitter).await {
            Ok(Some(prefs)) => prefs,
            Ok(None) => self.defaults.clone(),
            Err(err) => {
                warn!(%submitter, "failed to load preferences, using defaults: {err}");
                self.defaults.clone()
            }
        }
    }

    async fn reply(&self, chat: ChatId, text: &str, message: MessageId) {
        if let Err(err) = self.messenger.send_message(chat, text, Some(message)).await {
            warn!("failed to send reply: {err}");
        }
    }
}

/// Pull updates from the transport forever, dispatching each to the intake.
pub async fn run_gateway(intake: Arc<Intake>, source: Arc<dyn UpdateSource>) {
    loop {
        match source.next_updates().await {
            Ok(updates) => {
                for update in updates {
                    intake.handle(update).await;
                }
            }
            Err(err) => {
                warn!("update polling failed: {err}");
                tokio::time::sleep(POLL_FAILURE_BACKOFF).await;
            }
        }
    }
}
