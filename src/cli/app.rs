//! Config loading for the service entry point

use std::path::PathBuf;

use tracing::warn;

use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;

use super::args::Cli;

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

/// Default config file location
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("scribe-fleet")
        .join("config.toml")
}

/// Load the config file, returning an empty config when it does not exist.
pub async fn load_config_file(path: &PathBuf) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::empty());
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::ReadError(e.to_string()))?;
    toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Merge defaults, the config file, and CLI/env overrides, in that order of
/// increasing precedence.
pub async fn load_merged_config(cli: &Cli) -> AppConfig {
    let path = cli.config.clone().unwrap_or_else(default_config_path);
    let file_config = match load_config_file(&path).await {
        Ok(config) => config,
        Err(err) => {
            warn!(path = %path.display(), "ignoring unreadable config file: {err}");
            AppConfig::empty()
        }
    };

    let cli_config = AppConfig {
        bot_token: cli.bot_token.clone(),
        worker_address: cli.worker_address.clone(),
        ..Default::default()
    };

    AppConfig::defaults().merge(file_config).merge(cli_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn default_path_is_under_config_dir() {
        let path = default_config_path();
        let text = path.to_string_lossy();
        assert!(text.contains("scribe-fleet"));
        assert!(text.ends_with("config.toml"));
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let config = load_config_file(&PathBuf::from("/nonexistent/config.toml"))
            .await
            .unwrap();
        assert!(config.bot_token.is_none());
    }

    #[tokio::test]
    async fn cli_overrides_file_overrides_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        tokio::fs::write(
            &path,
            "bot_token = \"file-token\"\nglobal_limit = 3\n",
        )
        .await
        .unwrap();

        let cli = Cli::parse_from([
            "scribe-fleet",
            "-c",
            path.to_str().unwrap(),
            "--bot-token",
            "cli-token",
        ]);
        let config = load_merged_config(&cli).await;

        assert_eq!(config.bot_token, Some("cli-token".to_string()));
        assert_eq!(config.global_limit, Some(3));
        // untouched values come from defaults
        assert_eq!(config.per_submitter_limit, Some(1));
    }

    #[tokio::test]
    async fn malformed_file_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        tokio::fs::write(&path, "this is { not toml").await.unwrap();

        let cli = Cli::parse_from(["scribe-fleet", "-c", path.to_str().unwrap()]);
        let config = load_merged_config(&cli).await;
        assert_eq!(config.global_limit, Some(1));
    }
}
