//! Config command handler

use std::path::PathBuf;

use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;

use super::app::{default_config_path, load_config_file};
use super::args::ConfigAction;

/// Handle config subcommand
pub async fn handle_config_command(
    action: ConfigAction,
    path: Option<PathBuf>,
) -> Result<(), ConfigError> {
    let path = path.unwrap_or_else(default_config_path);
    match action {
        ConfigAction::Init => handle_init(&path).await,
        ConfigAction::Show => handle_show(&path).await,
        ConfigAction::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

async fn handle_init(path: &PathBuf) -> Result<(), ConfigError> {
    if path.exists() {
        return Err(ConfigError::AlreadyExists(
            path.to_string_lossy().to_string(),
        ));
    }
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;
    }
    let content = toml::to_string_pretty(&AppConfig::defaults())
        .map_err(|e| ConfigError::WriteError(e.to_string()))?;
    tokio::fs::write(path, content)
        .await
        .map_err(|e| ConfigError::WriteError(e.to_string()))?;
    println!("Config file created at: {}", path.display());
    Ok(())
}

async fn handle_show(path: &PathBuf) -> Result<(), ConfigError> {
    let effective = AppConfig::defaults().merge(load_config_file(path).await?);
    let content = toml::to_string_pretty(&effective)
        .map_err(|e| ConfigError::WriteError(e.to_string()))?;
    println!("{content}");
    Ok(())
}
