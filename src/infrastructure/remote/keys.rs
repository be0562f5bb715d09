//! SSH keypair management

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::process::Command;
use tracing::info;

/// Keypair setup errors
#[derive(Debug, Error)]
pub enum KeypairError {
    #[error("failed to create key directory: {0}")]
    CreateDir(String),

    #[error("ssh-keygen failed: {0}")]
    KeygenFailed(String),

    #[error("configured key {0} does not exist")]
    MissingKey(PathBuf),
}

/// Public key path for a private key path.
pub fn public_key_path(key_path: &Path) -> PathBuf {
    let mut name = key_path.as_os_str().to_os_string();
    name.push(".pub");
    PathBuf::from(name)
}

/// Make sure the service keypair exists, generating one when absent.
///
/// When `generate` is false (an operator-supplied key), a missing key is an
/// error instead.
pub async fn ensure_keypair(key_path: &Path, generate: bool) -> Result<(), KeypairError> {
    if key_path.exists() && public_key_path(key_path).exists() {
        return Ok(());
    }
    if !generate {
        return Err(KeypairError::MissingKey(key_path.to_path_buf()));
    }

    info!(path = %key_path.display(), "generating SSH keypair");
    if let Some(parent) = key_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| KeypairError::CreateDir(e.to_string()))?;
    }

    let output = Command::new("ssh-keygen")
        .args(["-t", "ed25519", "-N", "", "-C", "scribe-fleet", "-f"])
        .arg(key_path)
        .output()
        .await
        .map_err(|e| KeypairError::KeygenFailed(e.to_string()))?;

    if !output.status.success() {
        return Err(KeypairError::KeygenFailed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_key_path_appends_pub() {
        assert_eq!(
            public_key_path(Path::new("/state/id_ed25519")),
            PathBuf::from("/state/id_ed25519.pub")
        );
    }

    #[tokio::test]
    async fn missing_operator_key_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let key = tmp.path().join("absent_key");
        let err = ensure_keypair(&key, false).await.unwrap_err();
        assert!(matches!(err, KeypairError::MissingKey(_)));
    }
}
