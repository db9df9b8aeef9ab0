use std::path::{Component, Path, PathBuf};

use harvest_core::error::AppError;
use harvest_core::traits::ArchiveWriter;

/// Archive backed by a local directory. Keys are relative paths under
/// `root`; parent directories are created on demand.
#[derive(Debug, Clone)]
pub struct FileArchive {
    root: PathBuf,
}

impl FileArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a key to a path inside the root, refusing anything that could
    /// escape it.
    pub fn resolve(&self, key: &str) -> Result<PathBuf, AppError> {
        let invalid = |message: &str| AppError::ArchiveError {
            key: key.to_string(),
            message: message.to_string(),
        };

        if key.is_empty() {
            return Err(invalid("key is empty"));
        }

        let relative = Path::new(key);
        if relative.is_absolute() {
            return Err(invalid("key must be a relative path"));
        }
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(invalid("key may only contain plain path segments"));
        }

        Ok(self.root.join(relative))
    }
}

impl ArchiveWriter for FileArchive {
    async fn write(&self, key: &str, payload: &str) -> Result<(), AppError> {
        let path = self.resolve(key)?;
        let io_error = |e: std::io::Error| AppError::ArchiveError {
            key: key.to_string(),
            message: e.to_string(),
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }

        // Readers never see a half-written report.
        let mut staging = path.clone().into_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);

        tokio::fs::write(&staging, payload).await.map_err(io_error)?;
        tokio::fs::rename(&staging, &path).await.map_err(io_error)?;

        tracing::debug!(path = %path.display(), bytes = payload.len(), "Wrote archive file");
        Ok(())
    }
}
