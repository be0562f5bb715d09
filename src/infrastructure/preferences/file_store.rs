//! TOML-backed preference store adapter

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::application::ports::{PreferenceStore, Preferences};
use crate::domain::error::ConfigError;
use crate::domain::job::SubmitterId;
use crate::domain::transcript::{Language, ModelTier};

/// On-disk shape of one submitter's preferences. Fields are optional so a
/// partially-set record falls back to service defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredPreferences {
    model: Option<String>,
    language: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PreferencesFile {
    #[serde(default)]
    submitters: HashMap<String, StoredPreferences>,
}

/// Preference store persisted as a single TOML file
pub struct FilePreferenceStore {
    path: PathBuf,
    defaults: Preferences,
}

impl FilePreferenceStore {
    /// Create a store at the default data-dir path
    pub fn new(defaults: Preferences) -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("scribe-fleet");

        Self {
            path: data_dir.join("preferences.toml"),
            defaults,
        }
    }

    /// Create with custom path
    pub fn with_path(path: impl Into<PathBuf>, defaults: Preferences) -> Self {
        Self {
            path: path.into(),
            defaults,
        }
    }

    pub fn path(&self) -> PathBuf {
        self.path.clone()
    }

    async fn load_file(&self) -> Result<PreferencesFile, ConfigError> {
        if !self.path.exists() {
            return Ok(PreferencesFile::default());
        }
        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    async fn save_file(&self, file: &PreferencesFile) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }
        let content =
            toml::to_string_pretty(file).map_err(|e| ConfigError::WriteError(e.to_string()))?;
        fs::write(&self.path, content)
            .await
            .map_err(|e| ConfigError::WriteError(e.to_string()))
    }

    fn resolve(&self, stored: &StoredPreferences) -> Preferences {
        Preferences {
            model: stored
                .model
                .as_ref()
                .and_then(|s| s.parse::<ModelTier>().ok())
                .unwrap_or(self.defaults.model),
            language: stored
                .language
                .as_ref()
                .and_then(|s| s.parse::<Language>().ok())
                .unwrap_or_else(|| self.defaults.language.clone()),
        }
    }
}

#[async_trait]
impl PreferenceStore for FilePreferenceStore {
    async fn get(&self, submitter: SubmitterId) -> Result<Option<Preferences>, ConfigError> {
        let file = self.load_file().await?;
        Ok(file
            .submitters
            .get(&submitter.to_string())
            .map(|stored| self.resolve(stored)))
    }

    async fn set_model(&self, submitter: SubmitterId, model: ModelTier) -> Result<(), ConfigError> {
        let mut file = self.load_file().await?;
        file.submitters
            .entry(submitter.to_string())
            .or_default()
            .model = Some(model.to_string());
        self.save_file(&file).await
    }

    async fn set_language(
        &self,
        submitter: SubmitterId,
        language: Language,
    ) -> Result<(), ConfigError> {
        let mut file = self.load_file().await?;
        file.submitters
            .entry(submitter.to_string())
            .or_default()
            .language = Some(language.to_string());
        self.save_file(&file).await
    }
}
