//! Preliminary transcription task
//!
//! For preview-capable jobs a fast local pass runs concurrently with normal
//! queueing and edits a dedicated message once its result is ready. It is
//! best-effort and shares no synchronization with the scheduler or runner.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::warn;

use crate::domain::job::Job;
use crate::domain::transcript::clip_chars;

use super::ports::{LocalTranscriber, Messenger};

const PRELIMINARY_HEADER: &str = "Preliminary transcript (fast pass):\n\n";
const PRELIMINARY_EMPTY: &str = "Preliminary transcript was empty.";

/// Start the preliminary pass for a job whose preliminary message is set.
pub fn spawn_preliminary(
    messenger: Arc<dyn Messenger>,
    transcriber: Arc<dyn LocalTranscriber>,
    job: Arc<Job>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_preliminary(messenger.as_ref(), transcriber.as_ref(), &job).await;
    })
}

async fn run_preliminary(
    messenger: &dyn Messenger,
    transcriber: &dyn LocalTranscriber,
    job: &Job,
) {
    let Some(message) = job.preliminary_message else {
        return;
    };

    let text = match transcriber
        .transcribe(&job.input_path, &job.language, &job.id)
        .await
    {
        Ok(text) => text,
        Err(err) => {
            warn!(job = %job.id, "preliminary transcription failed: {err}");
            return;
        }
    };

    let body = preliminary_body(&text, messenger.text_limit());
    if let Err(err) = messenger.edit_message(job.chat, message, &body).await {
        warn!(job = %job.id, "failed to edit preliminary message: {err}");
    }
}

/// Message body for a preliminary result, clipped with an ellipsis when the
/// header plus text would exceed the transport limit. The final delivery
/// handles the full text properly later.
fn preliminary_body(text: &str, limit: usize) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return PRELIMINARY_EMPTY.to_string();
    }
    let header_chars = PRELIMINARY_HEADER.chars().count();
    let budget = limit.saturating_sub(header_chars);
    let clipped = clip_chars(trimmed, budget.saturating_sub(1));
    if clipped.len() == trimmed.len() {
        format!("{PRELIMINARY_HEADER}{trimmed}")
    } else {
        format!("{PRELIMINARY_HEADER}{clipped}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_gets_notice() {
        assert_eq!(preliminary_body("  \n", 4096), PRELIMINARY_EMPTY);
    }

    #[test]
    fn short_text_keeps_header_and_body() {
        let body = preliminary_body("hello there", 4096);
        assert_eq!(body, format!("{PRELIMINARY_HEADER}hello there"));
    }

    #[test]
    fn long_text_is_clipped_with_ellipsis() {
        let text = "x".repeat(200);
        let limit = 100;
        let body = preliminary_body(&text, limit);
        assert!(body.starts_with(PRELIMINARY_HEADER));
        assert!(body.ends_with('…'));
        assert!(body.chars().count() <= limit);
    }

    // Wrong boundary handling here would panic on multi-byte input.
    #[test]
    fn clipping_respects_multibyte_text() {
        let text = "é".repeat(300);
        let body = preliminary_body(&text, 50);
        assert!(body.ends_with('…'));
        assert!(body.chars().count() <= 50);
    }
}
