//! Result delivery policy
//!
//! Final transcripts edit the preliminary message in place when one exists;
//! oversized transcripts are truncated in the message and attached in full
//! as a file replying to the original request.

use tracing::warn;

use crate::domain::error::JobError;
use crate::domain::job::{Job, JobStatus};
use crate::domain::transcript::clip_chars;

use super::ports::{Messenger, MessengerError};

const NO_SPEECH_NOTICE: &str = "Transcription completed, but no speech was detected.";

/// Deliver the final transcript for a job.
pub async fn deliver_transcript(
    messenger: &dyn Messenger,
    job: &Job,
    transcript: &str,
) -> Result<(), MessengerError> {
    let text = transcript.trim();

    if text.is_empty() {
        return match job.preliminary_message {
            Some(message) => messenger.edit_message(job.chat, message, NO_SPEECH_NOTICE).await,
            None => messenger
                .send_message(job.chat, NO_SPEECH_NOTICE, Some(job.origin_message))
                .await
                .map(|_| ()),
        };
    }

    let limit = messenger.text_limit();
    let clipped = clip_chars(text, limit);
    let truncated = clipped.len() != text.len();

    match job.preliminary_message {
        Some(message) => messenger.edit_message(job.chat, message, clipped).await?,
        None => {
            messenger
                .send_message(job.chat, clipped, Some(job.origin_message))
                .await?;
        }
    }

    if truncated {
        messenger
            .send_document(
                job.chat,
                text.as_bytes().to_vec(),
                &format!("transcript-{}.txt", job.id),
                "Full transcript",
                Some(job.origin_message),
            )
            .await?;
    }

    Ok(())
}

/// Surface a job failure to the submitter as a single "Failed" status edit
/// with a short diagnostic. Internal detail stays in the logs.
pub async fn report_failure(messenger: &dyn Messenger, job: &Job, error: &JobError) {
    let text = format!("{}\n{error}", JobStatus::Failed.progress_label());
    let result = match job.status_message {
        Some(message) => messenger.edit_message(job.chat, message, &text).await,
        None => messenger
            .send_message(job.chat, &text, Some(job.origin_message))
            .await
            .map(|_| ()),
    };
    if let Err(err) = result {
        warn!(job = %job.id, "failed to report job failure: {err}");
    }
}
