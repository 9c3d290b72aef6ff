//! Checkpoint persistence and reconciliation.
//!
//! A checkpoint is a saved scene `{ "elements": [...] }` addressed by id.
//! Backends are selected from [`CheckpointConfig`]; the [`Reconciler`]
//! composes a restored checkpoint with newly streamed elements.

pub mod fs_store;
pub mod reconcile;
pub mod remote;
pub mod store;

use std::sync::Arc;

pub use fs_store::FsCheckpointStore;
pub use reconcile::{Reconciled, Reconciler};
pub use remote::RemoteCheckpointStore;
pub use store::{
    CheckpointPayload, CheckpointStore, MAX_CHECKPOINT_ID_LEN, MemoryCheckpointStore,
    validate_checkpoint_id,
};

use crate::config::{CheckpointBackend, CheckpointConfig};
use crate::error::Result;

/// Build the configured checkpoint backend.
///
/// # Errors
///
/// Fails if the file backend cannot create its directory or the remote
/// backend has no URL.
pub fn store_from_config(config: &CheckpointConfig) -> Result<Arc<dyn CheckpointStore>> {
    let store: Arc<dyn CheckpointStore> = match config.backend {
        CheckpointBackend::Memory => Arc::new(MemoryCheckpointStore::new()),
        CheckpointBackend::File => Arc::new(FsCheckpointStore::new(&config.directory)?),
        CheckpointBackend::Remote => Arc::new(RemoteCheckpointStore::from_config(config)?),
    };
    tracing::info!(backend = ?config.backend, "checkpoint store ready");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_backend_by_default() {
        assert!(store_from_config(&CheckpointConfig::default()).is_ok());
    }

    #[test]
    fn file_backend_creates_directory() {
        let dir = tempfile::tempdir().expect("tempdir in test");
        let config = CheckpointConfig {
            backend: CheckpointBackend::File,
            directory: dir.path().join("cps"),
            ..CheckpointConfig::default()
        };
        assert!(store_from_config(&config).is_ok());
        assert!(dir.path().join("cps").is_dir());
    }

    #[test]
    fn remote_backend_without_url_fails() {
        let config = CheckpointConfig {
            backend: CheckpointBackend::Remote,
            ..CheckpointConfig::default()
        };
        assert!(store_from_config(&config).is_err());
    }
}
