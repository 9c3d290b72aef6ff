//! Capability traits for the vector editing library and its environment.
//!
//! The pipeline never draws or edits itself. It converts, exports, and
//! refreshes scenes through these seams, so the headless reference
//! implementations in this module's siblings and a real editor binding are
//! interchangeable.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::svg::RenderedImage;
use crate::error::Result;
use crate::scene::{Element, RawElements, Scene};

/// Options passed to every export call.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    /// Padding around the scene's bounding box. Must equal the padding the
    /// viewport mapper uses.
    pub padding: f64,
    /// Background fill.
    pub background: String,
}

/// Shorthand-to-native conversion. Deterministic and id-preserving.
pub trait SceneConverter: Send + Sync {
    fn to_native(&self, raw: &RawElements) -> Result<Scene>;
}

/// Vector image export. Fails on structurally invalid input.
#[async_trait]
pub trait SceneExporter: Send + Sync {
    async fn export(&self, scene: &[Element], options: &ExportOptions) -> Result<RenderedImage>;
}

/// Recomputes text metrics once real fonts are available.
pub trait DimensionRestorer: Send + Sync {
    fn refresh(&self, scene: &[Element]) -> Scene;
}

/// Resolves when text-measurement fonts are loaded.
#[async_trait]
pub trait FontGate: Send + Sync {
    async fn ready(&self);
}

/// Fonts that are always ready (headless rendering).
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadyFonts;

#[async_trait]
impl FontGate for ReadyFonts {
    async fn ready(&self) {}
}

/// Per-stroke feedback (e.g. an audio cue), keyed by element type.
pub trait FeedbackSink: Send + Sync {
    fn stroke(&self, element_kind: &str);
}

/// Feedback that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFeedback;

impl FeedbackSink for NoopFeedback {
    fn stroke(&self, _element_kind: &str) {}
}

/// Receives the authoritative scene at the end of each stream so the full
/// editor opens on it.
pub trait EditCapture: Send + Sync {
    fn on_authoritative(&self, scene: &[Element]);
}

/// Single-slot holder of the latest authoritative scene.
#[derive(Debug, Default, Clone)]
pub struct SceneSlot {
    inner: Arc<Mutex<Option<Scene>>>,
}

impl SceneSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the current scene.
    pub fn get(&self) -> Option<Scene> {
        self.inner.lock().ok().and_then(|s| s.clone())
    }

    pub fn set(&self, scene: Scene) {
        if let Ok(mut slot) = self.inner.lock() {
            *slot = Some(scene);
        }
    }
}

impl EditCapture for SceneSlot {
    fn on_authoritative(&self, scene: &[Element]) {
        self.set(scene.to_vec());
    }
}

/// The full in-browser editing surface.
pub trait EditorSurface: Send + Sync {
    /// Mount the surface (invisible until [`EditorSurface::reveal`]).
    fn mount(&mut self) -> Result<()>;

    /// Replace the editor scene. Non-undoable updates skip the history.
    fn update_scene(&mut self, scene: Scene, undoable: bool);

    /// Make the mounted surface visible.
    fn reveal(&mut self);

    /// Current in-editor elements.
    fn elements(&self) -> Scene;

    fn unmount(&mut self);

    fn is_mounted(&self) -> bool;
}
