use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWriteExt};

const STAGING_PREFIX: &str = "convert-doc-";

#[derive(Error, Debug)]
pub enum StagingError {
    #[error("could not create staging directory: {0}")]
    CreateDir(#[source] std::io::Error),

    #[error("{0}")]
    Write(#[source] std::io::Error),
}

/// Creates one private directory per upload under a shared root.
pub struct StagingArea {
    root: PathBuf,
}

/// An upload materialized on disk.
///
/// The containing directory is removed when this value is dropped, which
/// covers normal returns, early `?` exits and cancelled request futures.
pub struct StagedFile {
    dir: Option<TempDir>,
    path: PathBuf,
    size: u64,
    original_filename: String,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copy `reader` into a fresh directory. The on-disk name is
    /// `document.<extension>`; the client filename is only kept as metadata.
    pub async fn stage<R>(
        &self,
        original_filename: &str,
        extension: &str,
        mut reader: R,
    ) -> Result<StagedFile, StagingError>
    where
        R: AsyncRead + Unpin,
    {
        // mkdir of one fresh directory; cheap enough to stay on the runtime
        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.root)
            .map_err(StagingError::CreateDir)?;
        let path = dir.path().join(format!("document.{}", extension));

        // From here on `staged` owns the directory, so any failure below
        // drops it and removes whatever was written.
        let mut staged = StagedFile {
            dir: Some(dir),
            path,
            size: 0,
            original_filename: original_filename.to_string(),
        };

        let mut file = tokio::fs::File::create(&staged.path)
            .await
            .map_err(StagingError::Write)?;
        staged.size = tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(StagingError::Write)?;
        file.flush().await.map_err(StagingError::Write)?;

        tracing::debug!(
            "Staged '{}' ({} bytes) at {}",
            staged.original_filename,
            staged.size,
            staged.path.display()
        );
        Ok(staged)
    }
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_ref().map(|d| d.path())
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn original_filename(&self) -> &str {
        &self.original_filename
    }
}

/// Removal runs inline, on whichever thread drops the value, so the directory
/// is gone by the time the response is written. A staged upload is a single
/// file (bounded by the body limit), which keeps this to one unlink and one
/// rmdir.
impl Drop for StagedFile {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        let dir_path = dir.path().to_path_buf();
        match dir.close() {
            Ok(()) => tracing::debug!("🧹 Removed staging directory {}", dir_path.display()),
            Err(e) => tracing::warn!(
                "Failed to remove staging directory {}: {}",
                dir_path.display(),
                e
            ),
        }
    }
}
