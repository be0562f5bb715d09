//! Inbound update port interface

use async_trait::async_trait;

use crate::domain::job::{ChatId, MessageId, SubmitterId};

use super::messenger::MessengerError;
use super::staging::AttachmentRef;

/// An inbound event from the chat transport, already reduced to the
/// operations this service exposes.
#[derive(Debug, Clone)]
pub enum InboundUpdate {
    /// A media message carrying something to transcribe
    Media {
        chat: ChatId,
        message: MessageId,
        submitter: SubmitterId,
        username: Option<String>,
        attachment: AttachmentRef,
    },
    /// A command message such as `/model turbo`
    Command {
        chat: ChatId,
        message: MessageId,
        submitter: SubmitterId,
        username: Option<String>,
        name: String,
        arg: Option<String>,
    },
    /// A cancel control activated on a status message
    CancelRequest {
        submitter: SubmitterId,
        job_id: String,
    },
    /// Anything else worth replying "can't process" to
    Unsupported {
        chat: ChatId,
        message: MessageId,
        submitter: SubmitterId,
        username: Option<String>,
    },
}

/// Port for pulling inbound updates from the chat transport.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Wait for and return the next batch of updates.
    async fn next_updates(&self) -> Result<Vec<InboundUpdate>, MessengerError>;
}
