//! Domain error types

use thiserror::Error;

/// Terminal failure of a transcription job.
///
/// Every variant carries a human-readable detail shown to the submitter in
/// the final "Failed" status edit; [`JobError::code`] gives the short
/// machine-readable code used in logs.
#[derive(Debug, Clone, Error)]
pub enum JobError {
    #[error("input file not found: {0}")]
    InputNotFound(String),

    #[error("media conversion timed out")]
    ConversionTimeout,

    #[error("transcription engine failed: {0}")]
    Engine(String),

    #[error("worker provisioning failed: {0}")]
    Provisioning(String),

    #[error("timed out connecting to worker at {0}")]
    ConnectTimeout(String),

    #[error("remote command failed: {0}")]
    RemoteCommand(String),

    #[error("malformed transcription result: {0}")]
    MalformedResult(String),

    #[error("job exceeded the maximum processing time")]
    OverallTimeout,

    #[error("failed to download the input file: {0}")]
    Download(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl JobError {
    /// Short machine-readable code, stable across detail-message changes.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InputNotFound(_) => "E_INPUT",
            Self::ConversionTimeout => "E_FFMPEG_TIMEOUT",
            Self::Engine(_) => "E_ENGINE",
            Self::Provisioning(_) => "E_PROVISION",
            Self::ConnectTimeout(_) => "E_CONNECT_TIMEOUT",
            Self::RemoteCommand(_) => "E_REMOTE",
            Self::MalformedResult(_) => "E_BAD_RESULT",
            Self::OverallTimeout => "E_JOB_TIMEOUT",
            Self::Download(_) => "E_DOWNLOAD",
            Self::Internal(_) => "E_INTERNAL",
        }
    }
}

/// Error when configuration fails
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid config value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    #[error("Config file already exists at: {0}")]
    AlreadyExists(String),
}
