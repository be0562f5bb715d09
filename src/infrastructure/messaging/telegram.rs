//! Telegram Bot API adapter
//!
//! Implements the Messenger, InputStager, and UpdateSource ports against the
//! Bot API over HTTP. The base URL is configurable for tests and for a local
//! Bot API server.

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ports::{
    AttachmentRef, InboundUpdate, InputStager, Messenger, MessengerError, StagingError,
    UpdateSource, DEFAULT_TEXT_LIMIT,
};
use crate::domain::job::{ChatId, JobId, MessageId};

const API_BASE_URL: &str = "https://api.telegram.org";

/// Long-poll window for getUpdates, in seconds.
const POLL_WINDOW_SECS: u64 = 50;

// Request types for the Bot API

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: ChatId,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to_message_id: Option<MessageId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
struct EditMessageRequest<'a> {
    chat_id: ChatId,
    message_id: MessageId,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardMarkup {
    inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardButton {
    text: String,
    callback_data: String,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    offset: i64,
    timeout: u64,
}

#[derive(Debug, Serialize)]
struct GetFileRequest<'a> {
    file_id: &'a str,
}

#[derive(Debug, Serialize)]
struct AnswerCallbackRequest<'a> {
    callback_query_id: &'a str,
}

// Response types for the Bot API

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    message_id: MessageId,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    file_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<IncomingMessage>,
    callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    message_id: MessageId,
    from: Option<User>,
    chat: Chat,
    text: Option<String>,
    voice: Option<FileMeta>,
    audio: Option<NamedFileMeta>,
    video: Option<NamedFileMeta>,
    video_note: Option<FileMeta>,
    document: Option<NamedFileMeta>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: ChatId,
}

#[derive(Debug, Deserialize)]
struct FileMeta {
    file_id: String,
}

#[derive(Debug, Deserialize)]
struct NamedFileMeta {
    file_id: String,
    file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    id: String,
    from: User,
    data: Option<String>,
}

/// Telegram Bot API client
pub struct TelegramMessenger {
    client: reqwest::Client,
    base_url: String,
    token: String,
    offset: AtomicI64,
}

impl TelegramMessenger {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, API_BASE_URL)
    }

    /// Create a client against a custom API server (tests, local Bot API).
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            offset: AtomicI64::new(0),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.token)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{file_path}", self.base_url, self.token)
    }

    async fn call<T, R>(&self, method: &str, body: &T) -> Result<R, MessengerError>
    where
        T: Serialize + Sync,
        R: serde::de::DeserializeOwned,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .timeout(Duration::from_secs(POLL_WINDOW_SECS + 10))
            .json(body)
            .send()
            .await
            .map_err(|e| MessengerError::RequestFailed(e.to_string()))?;

        let envelope: ApiEnvelope<R> = response
            .json()
            .await
            .map_err(|e| MessengerError::ParseError(e.to_string()))?;

        if !envelope.ok {
            return Err(MessengerError::Rejected(
                envelope
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            ));
        }
        envelope
            .result
            .ok_or_else(|| MessengerError::ParseError("ok response without result".to_string()))
    }

    fn cancel_keyboard(job: &JobId) -> InlineKeyboardMarkup {
        InlineKeyboardMarkup {
            inline_keyboard: vec![vec![InlineKeyboardButton {
                text: "Cancel".to_string(),
                callback_data: format!("cancel:{job}"),
            }]],
        }
    }

    fn map_update(&self, update: Update) -> Option<InboundUpdate> {
        if let Some(query) = update.callback_query {
            let job_id = query
                .data
                .as_deref()
                .and_then(|data| data.strip_prefix("cancel:"))?
                .to_string();
            return Some(InboundUpdate::CancelRequest {
                submitter: query.from.id,
                job_id,
            });
        }

        let message = update.message?;
        let from = message.from.as_ref()?;
        let submitter = from.id;
        let username = from.username.clone();

        if let Some((file_id, filename)) = extract_attachment(&message) {
            return Some(InboundUpdate::Media {
                chat: message.chat.id,
                message: message.message_id,
                submitter,
                username,
                attachment: AttachmentRef { file_id, filename },
            });
        }

        if let Some(text) = message.text.as_deref() {
            if let Some((name, arg)) = parse_command(text) {
                return Some(InboundUpdate::Command {
                    chat: message.chat.id,
                    message: message.message_id,
                    submitter,
                    username,
                    name,
                    arg,
                });
            }
            // plain text is not worth a reply
            return None;
        }

        Some(InboundUpdate::Unsupported {
            chat: message.chat.id,
            message: message.message_id,
            submitter,
            username,
        })
    }
}

/// Transport file handle and inferred filename for any media kind.
fn extract_attachment(message: &IncomingMessage) -> Option<(String, String)> {
    let id = message.message_id;
    if let Some(voice) = &message.voice {
        return Some((voice.file_id.clone(), format!("voice-{id}.ogg")));
    }
    if let Some(audio) = &message.audio {
        let name = audio
            .file_name
            .clone()
            .unwrap_or_else(|| format!("audio-{id}.mp3"));
        return Some((audio.file_id.clone(), name));
    }
    if let Some(video) = &message.video {
        let name = video
            .file_name
            .clone()
            .unwrap_or_else(|| format!("video-{id}.mp4"));
        return Some((video.file_id.clone(), name));
    }
    if let Some(note) = &message.video_note {
        return Some((note.file_id.clone(), format!("videonote-{id}.mp4")));
    }
    if let Some(document) = &message.document {
        let name = document
            .file_name
            .clone()
            .unwrap_or_else(|| format!("document-{id}"));
        return Some((document.file_id.clone(), name));
    }
    None
}

/// Split `/model turbo@...` style text into a command name and argument.
fn parse_command(text: &str) -> Option<(String, Option<String>)> {
    let text = text.trim();
    let rest = text.strip_prefix('/')?;
    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next()?.split('@').next()?.to_ascii_lowercase();
    if name.is_empty() {
        return None;
    }
    let arg = parts
        .next()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty());
    Some((name, arg))
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId, MessengerError> {
        let message: MessageRef = self
            .call(
                "sendMessage",
                &SendMessageRequest {
                    chat_id: chat,
                    text,
                    reply_to_message_id: reply_to,
                    reply_markup: None,
                },
            )
            .await?;
        Ok(message.message_id)
    }

    async fn send_cancellable(
        &self,
        chat: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
        job: &JobId,
    ) -> Result<MessageId, MessengerError> {
        let message: MessageRef = self
            .call(
                "sendMessage",
                &SendMessageRequest {
                    chat_id: chat,
                    text,
                    reply_to_message_id: reply_to,
                    reply_markup: Some(Self::cancel_keyboard(job)),
                },
            )
            .await?;
        Ok(message.message_id)
    }

    async fn edit_message(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
    ) -> Result<(), MessengerError> {
        // the API returns the edited Message or `true`; neither is needed
        let _: serde_json::Value = self
            .call(
                "editMessageText",
                &EditMessageRequest {
                    chat_id: chat,
                    message_id: message,
                    text,
                },
            )
            .await?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat: ChatId,
        bytes: Vec<u8>,
        filename: &str,
        caption: &str,
        reply_to: Option<MessageId>,
    ) -> Result<(), MessengerError> {
        let mut form = reqwest::multipart::Form::new()
            .text("chat_id", chat.to_string())
            .text("caption", caption.to_string())
            .part(
                "document",
                reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string()),
            );
        if let Some(reply) = reply_to {
            form = form.text("reply_to_message_id", reply.to_string());
        }

        let response = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| MessengerError::RequestFailed(e.to_string()))?;

        let envelope: ApiEnvelope<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| MessengerError::ParseError(e.to_string()))?;
        if !envelope.ok {
            return Err(MessengerError::Rejected(
                envelope
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            ));
        }
        Ok(())
    }

    fn text_limit(&self) -> usize {
        DEFAULT_TEXT_LIMIT
    }
}

#[async_trait]
impl UpdateSource for TelegramMessenger {
    async fn next_updates(&self) -> Result<Vec<InboundUpdate>, MessengerError> {
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                &GetUpdatesRequest {
                    offset: self.offset.load(Ordering::SeqCst),
                    timeout: POLL_WINDOW_SECS,
                },
            )
            .await?;

        let mut inbound = Vec::new();
        for update in updates {
            self.offset
                .fetch_max(update.update_id + 1, Ordering::SeqCst);
            // acknowledge cancel presses so the client stops its spinner
            if let Some(query) = &update.callback_query {
                if let Err(err) = self
                    .call::<_, serde_json::Value>(
                        "answerCallbackQuery",
                        &AnswerCallbackRequest {
                            callback_query_id: &query.id,
                        },
                    )
                    .await
                {
                    debug!("answerCallbackQuery failed: {err}");
                }
            }
            match self.map_update(update) {
                Some(mapped) => inbound.push(mapped),
                None => debug!("dropping unmapped update"),
            }
        }
        Ok(inbound)
    }
}

#[async_trait]
impl InputStager for TelegramMessenger {
    async fn stage(&self, attachment: &AttachmentRef, dest: &Path) -> Result<(), StagingError> {
        let info: FileInfo = self
            .call(
                "getFile",
                &GetFileRequest {
                    file_id: &attachment.file_id,
                },
            )
            .await
            .map_err(|e| StagingError::DownloadFailed(e.to_string()))?;

        let file_path = info
            .file_path
            .ok_or_else(|| StagingError::DownloadFailed("no file_path in response".to_string()))?;

        let response = self
            .client
            .get(self.file_url(&file_path))
            .send()
            .await
            .map_err(|e| StagingError::DownloadFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(StagingError::DownloadFailed(format!(
                "file download returned {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StagingError::DownloadFailed(e.to_string()))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StagingError::WriteFailed(e.to_string()))?;
        }
        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| StagingError::WriteFailed(e.to_string()))?;
        Ok(())
    }
}
