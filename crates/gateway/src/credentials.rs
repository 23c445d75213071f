//! Persisted link credentials.
//!
//! The bridge stores whatever the network hands back after a successful
//! scan under a directory we own. Wiping that directory is what "clear
//! session" means: the next connect starts from a fresh pairing payload.

use std::path::PathBuf;

/// Handle on the link-credential directory.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Remove all persisted link credentials. Missing directory is fine.
    pub async fn clear(&self) -> std::io::Result<()> {
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "Link credentials cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
