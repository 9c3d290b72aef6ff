//! Compose a restored checkpoint with freshly streamed elements.

use std::collections::HashSet;
use std::sync::Arc;

use super::store::CheckpointStore;
use crate::editor::SceneConverter;
use crate::error::Result;
use crate::scene::{RawElements, Scene, ViewportRect, classify};

/// A composed scene: filtered base first, converted new elements after.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciled {
    pub scene: Scene,
    /// How many leading elements of `scene` came from the checkpoint.
    pub base_len: usize,
    /// Camera record embedded in the checkpoint, if any.
    pub base_viewport: Option<ViewportRect>,
}

impl Reconciled {
    /// Elements that arrived in the current stream.
    pub fn new_elements(&self) -> &[crate::scene::Element] {
        &self.scene[self.base_len..]
    }

    pub fn has_base(&self) -> bool {
        self.base_len > 0
    }
}

#[derive(Debug, Clone)]
struct CachedBase {
    id: String,
    /// `None` records a miss so repeated chunks do not refetch.
    base: Option<(Scene, Option<ViewportRect>)>,
}

/// Checkpoint reconciler with a single-slot cache keyed by the most
/// recently restored id.
pub struct Reconciler {
    store: Arc<dyn CheckpointStore>,
    converter: Arc<dyn SceneConverter>,
    cache: Option<CachedBase>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn CheckpointStore>, converter: Arc<dyn SceneConverter>) -> Self {
        Self {
            store,
            converter,
            cache: None,
        }
    }

    /// Id currently held by the cache.
    pub fn cached_id(&self) -> Option<&str> {
        self.cache.as_ref().map(|c| c.id.as_str())
    }

    pub fn clear_cache(&mut self) {
        self.cache = None;
    }

    /// Compose `[base minus deleted..., converted new...]`.
    ///
    /// A missing or unreadable checkpoint yields no base. Only a failure to
    /// convert `new_raw` is an error.
    pub async fn reconcile(
        &mut self,
        restore_id: Option<&str>,
        delete_ids: &HashSet<String>,
        new_raw: &RawElements,
    ) -> Result<Reconciled> {
        let (base, base_viewport) = match restore_id {
            Some(id) => self.base_for(id).await.unwrap_or_default(),
            None => (Vec::new(), None),
        };

        let mut scene: Scene = base
            .into_iter()
            .filter(|el| !el.is_targeted_by(delete_ids))
            .collect();
        let base_len = scene.len();

        // Unnamed new elements must not take an id the base already uses.
        let reserved: HashSet<String> = scene.iter().map(|el| el.id.clone()).collect();
        let mut named = new_raw.clone();
        named.assign_missing_ids(&reserved);
        scene.extend(self.converter.to_native(&named)?);

        Ok(Reconciled {
            scene,
            base_len,
            base_viewport,
        })
    }

    async fn base_for(&mut self, id: &str) -> Option<(Scene, Option<ViewportRect>)> {
        if let Some(cached) = &self.cache
            && cached.id == id
        {
            return cached.base.clone();
        }

        let payload = match self.store.load(id).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                tracing::info!(checkpoint_id = id, "checkpoint not found, continuing without base");
                self.cache = Some(CachedBase {
                    id: id.to_owned(),
                    base: None,
                });
                return None;
            }
            Err(e) => {
                // Not cached: the next chunk retries the fetch.
                tracing::warn!(checkpoint_id = id, error = %e, "checkpoint fetch failed");
                return None;
            }
        };

        // Stored scenes may be raw shorthand and may embed a camera record.
        let values = payload
            .elements
            .iter()
            .filter_map(|el| serde_json::to_value(el).ok())
            .collect();
        let stored = classify(values);
        let base = match self.converter.to_native(&stored.draw_elements) {
            Ok(scene) => Some((scene, stored.viewport)),
            Err(e) => {
                tracing::warn!(checkpoint_id = id, error = %e, "checkpoint conversion failed");
                None
            }
        };

        tracing::debug!(
            checkpoint_id = id,
            element_count = base.as_ref().map_or(0, |(s, _)| s.len()),
            "checkpoint loaded"
        );
        self.cache = Some(CachedBase {
            id: id.to_owned(),
            base: base.clone(),
        });
        base
    }
}
