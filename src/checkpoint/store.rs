//! Checkpoint storage trait and in-memory implementation.
//!
//! Defines the [`CheckpointStore`] trait every backend satisfies, and
//! provides [`MemoryCheckpointStore`] for tests and ephemeral sessions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{Result, StreamError};
use crate::scene::Element;

/// Longest accepted checkpoint identifier.
pub const MAX_CHECKPOINT_ID_LEN: usize = 128;

/// Persisted checkpoint body: `{ "elements": [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointPayload {
    pub elements: Vec<Element>,
}

impl CheckpointPayload {
    pub fn new(elements: Vec<Element>) -> Self {
        Self { elements }
    }
}

/// Reject ids that are empty, too long, or contain anything outside
/// `[A-Za-z0-9_-]`. Keeps ids safe as file names and store keys.
pub fn validate_checkpoint_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(StreamError::Checkpoint("checkpoint id is empty".into()));
    }
    if id.len() > MAX_CHECKPOINT_ID_LEN {
        return Err(StreamError::Checkpoint(format!(
            "checkpoint id exceeds {MAX_CHECKPOINT_ID_LEN} characters"
        )));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(StreamError::Checkpoint(format!(
            "checkpoint id contains invalid characters: {id}"
        )));
    }
    Ok(())
}

/// Async checkpoint storage backend.
///
/// `load` distinguishes "not found" (`Ok(None)`) from a failed read
/// (`Err`); callers in the render path treat both as "no base scene".
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Save a snapshot under `id`, replacing any previous snapshot.
    async fn save(&self, id: &str, payload: &CheckpointPayload) -> Result<()>;

    /// Load the snapshot stored under `id`.
    async fn load(&self, id: &str) -> Result<Option<CheckpointPayload>>;
}

/// In-memory checkpoint store.
///
/// Checkpoints live in an `Arc<RwLock<HashMap>>` and are lost when the
/// last clone is dropped. Cheaply cloneable.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: Arc<RwLock<HashMap<String, CheckpointPayload>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.checkpoints.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.checkpoints.read().await.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, id: &str, payload: &CheckpointPayload) -> Result<()> {
        validate_checkpoint_id(id)?;
        let mut checkpoints = self.checkpoints.write().await;
        checkpoints.insert(id.to_owned(), payload.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<CheckpointPayload>> {
        validate_checkpoint_id(id)?;
        let checkpoints = self.checkpoints.read().await;
        Ok(checkpoints.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_validation() {
        assert!(validate_checkpoint_id("cp_01-abc").is_ok());
        assert!(validate_checkpoint_id("").is_err());
        assert!(validate_checkpoint_id("../etc/passwd").is_err());
        assert!(validate_checkpoint_id("a b").is_err());
        assert!(validate_checkpoint_id(&"x".repeat(MAX_CHECKPOINT_ID_LEN + 1)).is_err());
    }

    #[tokio::test]
    async fn memory_store_save_and_load() {
        let store = MemoryCheckpointStore::new();
        let payload = CheckpointPayload::new(vec![Element::new("a", "rectangle", 1.0, 2.0)]);
        store.save("cp1", &payload).await.expect("save in test");
        let loaded = store.load("cp1").await.expect("load in test");
        assert_eq!(loaded, Some(payload));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn memory_store_missing_is_none() {
        let store = MemoryCheckpointStore::new();
        assert!(store.is_empty().await);
        let loaded = store.load("nope").await.expect("load in test");
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn memory_store_clones_share_state() {
        let store = MemoryCheckpointStore::new();
        let clone = store.clone();
        clone
            .save("shared", &CheckpointPayload::default())
            .await
            .expect("save in test");
        assert!(store.load("shared").await.expect("load in test").is_some());
    }

    #[test]
    fn payload_json_shape() {
        let payload = CheckpointPayload::new(vec![Element::new("a", "ellipse", 0.0, 0.0)]);
        let value = serde_json::to_value(&payload).expect("serialize in test");
        assert!(value["elements"].is_array());
        assert_eq!(value["elements"][0]["type"], "ellipse");
    }
}
