//! Chat transport port interface

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::job::{ChatId, JobId, MessageId};

/// Text limit of a single message when the transport does not report one.
pub const DEFAULT_TEXT_LIMIT: usize = 4096;

/// Chat transport errors
#[derive(Debug, Clone, Error)]
pub enum MessengerError {
    #[error("transport request failed: {0}")]
    RequestFailed(String),

    #[error("transport rejected the request: {0}")]
    Rejected(String),

    #[error("failed to parse transport response: {0}")]
    ParseError(String),
}

/// Port for the chat transport the service talks back through.
///
/// Implementations must report failures as errors rather than panicking;
/// callers decide whether a failed notification is fatal.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a new message, optionally as a reply.
    ///
    /// # Returns
    /// The handle of the sent message, for later in-place edits.
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId, MessengerError>;

    /// Send a new message carrying a cancel control for the given job.
    async fn send_cancellable(
        &self,
        chat: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
        job: &JobId,
    ) -> Result<MessageId, MessengerError>;

    /// Edit a previously sent message in place.
    async fn edit_message(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
    ) -> Result<(), MessengerError>;

    /// Send a document attachment, optionally as a reply.
    async fn send_document(
        &self,
        chat: ChatId,
        bytes: Vec<u8>,
        filename: &str,
        caption: &str,
        reply_to: Option<MessageId>,
    ) -> Result<(), MessengerError>;

    /// Maximum message text length in characters.
    fn text_limit(&self) -> usize {
        DEFAULT_TEXT_LIMIT
    }
}

/// Blanket implementation for boxed messenger types
#[async_trait]
impl Messenger for Box<dyn Messenger> {
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId, MessengerError> {
        self.as_ref().send_message(chat, text, reply_to).await
    }

    async fn send_cancellable(
        &self,
        chat: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
        job: &JobId,
    ) -> Result<MessageId, MessengerError> {
        self.as_ref().send_cancellable(chat, text, reply_to, job).await
    }

    async fn edit_message(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
    ) -> Result<(), MessengerError> {
        self.as_ref().edit_message(chat, message, text).await
    }

    async fn send_document(
        &self,
        chat: ChatId,
        bytes: Vec<u8>,
        filename: &str,
        caption: &str,
        reply_to: Option<MessageId>,
    ) -> Result<(), MessengerError> {
        self.as_ref()
            .send_document(chat, bytes, filename, caption, reply_to)
            .await
    }

    fn text_limit(&self) -> usize {
        self.as_ref().text_limit()
    }
}
