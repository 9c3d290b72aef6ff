//! Filesystem-backed checkpoint store.
//!
//! Each checkpoint is stored as `{data_dir}/{id}.json`. Writes are atomic
//! (temp file + fsync + rename) so a crash never leaves a torn checkpoint.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::store::{CheckpointPayload, CheckpointStore, validate_checkpoint_id};
use crate::error::{Result, StreamError};

/// Filesystem-backed checkpoint store.
#[derive(Debug, Clone)]
pub struct FsCheckpointStore {
    data_dir: PathBuf,
}

impl FsCheckpointStore {
    /// Create a store rooted at `data_dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Checkpoint`] if the directory cannot be created.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir).map_err(|e| {
            StreamError::Checkpoint(format!(
                "failed to create checkpoint directory {}: {e}",
                data_dir.display()
            ))
        })?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn checkpoint_path(&self, id: &str) -> PathBuf {
        self.data_dir.join(format!("{id}.json"))
    }

    async fn write_atomic(&self, id: &str, payload: &CheckpointPayload) -> Result<()> {
        let path = self.checkpoint_path(id);
        let json = serde_json::to_vec(payload)
            .map_err(|e| StreamError::Checkpoint(format!("failed to serialize checkpoint: {e}")))?;

        let tmp_path = self.data_dir.join(format!(".{id}.tmp"));
        tokio::fs::write(&tmp_path, &json).await.map_err(|e| {
            StreamError::Checkpoint(format!(
                "failed to write temp file {}: {e}",
                tmp_path.display()
            ))
        })?;

        if let Ok(file) = tokio::fs::File::open(&tmp_path).await {
            let _ = file.sync_all().await;
        }

        tokio::fs::rename(&tmp_path, &path).await.map_err(|e| {
            StreamError::Checkpoint(format!(
                "failed to rename temp file to {}: {e}",
                path.display()
            ))
        })
    }
}

#[async_trait]
impl CheckpointStore for FsCheckpointStore {
    async fn save(&self, id: &str, payload: &CheckpointPayload) -> Result<()> {
        validate_checkpoint_id(id)?;
        self.write_atomic(id, payload).await?;
        tracing::debug!(checkpoint_id = id, elements = payload.elements.len(), "checkpoint written");
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<CheckpointPayload>> {
        validate_checkpoint_id(id)?;
        let path = self.checkpoint_path(id);
        let content = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StreamError::Checkpoint(format!(
                    "failed to read checkpoint {}: {e}",
                    path.display()
                )));
            }
        };
        serde_json::from_slice(&content).map(Some).map_err(|e| {
            StreamError::Checkpoint(format!(
                "failed to parse checkpoint {}: {e}",
                path.display()
            ))
        })
    }
}
