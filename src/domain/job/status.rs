//! Job lifecycle states

use std::fmt;

/// Lifecycle states of a transcription job.
///
/// Linear progression:
///   QUEUED -> PROVISIONING -> CONNECTING -> UPLOADING -> TRANSCRIBING
///     -> FETCHING -> DELIVERING -> DONE
/// with FAILED and CANCELED reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JobStatus {
    #[default]
    Queued,
    Provisioning,
    Connecting,
    Uploading,
    Transcribing,
    Fetching,
    Delivering,
    Done,
    Failed,
    Canceled,
}

impl JobStatus {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Provisioning => "provisioning",
            Self::Connecting => "connecting",
            Self::Uploading => "uploading",
            Self::Transcribing => "transcribing",
            Self::Fetching => "fetching",
            Self::Delivering => "delivering",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    /// Text shown in the in-place status message for this state.
    pub const fn progress_label(&self) -> &'static str {
        match self {
            Self::Queued => "Queued",
            Self::Provisioning => "Provisioning worker…",
            Self::Connecting => "Connecting to worker…",
            Self::Uploading => "Uploading…",
            Self::Transcribing => "Transcribing…",
            Self::Fetching => "Fetching transcript…",
            Self::Delivering => "Delivering…",
            Self::Done => "Done ✅",
            Self::Failed => "Failed ❌",
            Self::Canceled => "Canceled",
        }
    }

    /// Whether this state ends the job's lifecycle.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Canceled)
    }

    /// Whether a job in this state holds (or is about to hold) a worker.
    pub const fn is_running(&self) -> bool {
        matches!(
            self,
            Self::Provisioning
                | Self::Connecting
                | Self::Uploading
                | Self::Transcribing
                | Self::Fetching
                | Self::Delivering
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
