use anyhow::{Result, bail};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

/// On-disk media bucket.
///
/// Each upload is stored as a single flat file at `{dir}/{upload_id}`.
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Media storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    /// Path to the file for a given upload. Ids must be UUIDs, which rules
    /// out path traversal.
    pub fn file_path(&self, upload_id: &str) -> Result<PathBuf> {
        if upload_id.parse::<Uuid>().is_err() {
            bail!("invalid upload id '{}'", upload_id);
        }
        Ok(self.dir.join(upload_id))
    }

    pub async fn write_file(&self, upload_id: &str, data: &[u8]) -> Result<()> {
        let path = self.file_path(upload_id)?;
        let mut file = fs::File::create(&path).await?;
        file.write_all(data).await?;
        file.flush().await?;
        Ok(())
    }

    pub async fn read_file(&self, upload_id: &str) -> Result<Vec<u8>> {
        let path = self.file_path(upload_id)?;
        Ok(fs::read(&path).await?)
    }

    /// Delete an upload's file. A file that is already gone is not an error.
    pub async fn delete_file(&self, upload_id: &str) -> Result<()> {
        let path = self.file_path(upload_id)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted media file {}", upload_id);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Media file {} already gone", upload_id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort removal of many files, logging failures.
    pub async fn delete_files(&self, upload_ids: &[String]) -> usize {
        let mut removed = 0;
        for id in upload_ids {
            match self.delete_file(id).await {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to delete media file {}: {}", id, e),
            }
        }
        removed
    }
}
