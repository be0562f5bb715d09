//! Per-submitter preference storage port interface

use async_trait::async_trait;

use crate::domain::error::ConfigError;
use crate::domain::job::SubmitterId;
use crate::domain::transcript::{Language, ModelTier};

/// A submitter's transcription preferences.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preferences {
    pub model: ModelTier,
    pub language: Language,
}

/// Port for persisting per-submitter preferences.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Load a submitter's preferences, or None when never set.
    async fn get(&self, submitter: SubmitterId) -> Result<Option<Preferences>, ConfigError>;

    /// Update the model tier, keeping the stored language.
    async fn set_model(&self, submitter: SubmitterId, model: ModelTier) -> Result<(), ConfigError>;

    /// Update the language, keeping the stored model tier.
    async fn set_language(
        &self,
        submitter: SubmitterId,
        language: Language,
    ) -> Result<(), ConfigError>;
}
