//! In-memory editor surface for headless hosts and tests.

use super::backend::EditorSurface;
use crate::error::{Result, StreamError};
use crate::scene::Scene;

/// Editor surface that keeps its scene in memory.
#[derive(Debug, Default, Clone)]
pub struct HeadlessEditor {
    mounted: bool,
    visible: bool,
    scene: Scene,
    undo_depth: usize,
    mount_count: usize,
    fail_mount: bool,
}

impl HeadlessEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// An editor whose `mount` always fails.
    pub fn failing() -> Self {
        Self {
            fail_mount: true,
            ..Self::default()
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Number of undoable updates applied since mount.
    pub fn undo_depth(&self) -> usize {
        self.undo_depth
    }

    pub fn mount_count(&self) -> usize {
        self.mount_count
    }

    /// Simulate a user edit on the mounted surface.
    pub fn edit(&mut self, f: impl FnOnce(&mut Scene)) {
        f(&mut self.scene);
        self.undo_depth += 1;
    }
}

impl EditorSurface for HeadlessEditor {
    fn mount(&mut self) -> Result<()> {
        if self.fail_mount {
            return Err(StreamError::Lifecycle("editor surface failed to mount".into()));
        }
        self.mounted = true;
        self.visible = false;
        self.undo_depth = 0;
        self.mount_count += 1;
        Ok(())
    }

    fn update_scene(&mut self, scene: Scene, undoable: bool) {
        self.scene = scene;
        if undoable {
            self.undo_depth += 1;
        }
    }

    fn reveal(&mut self) {
        if self.mounted {
            self.visible = true;
        }
    }

    fn elements(&self) -> Scene {
        self.scene.clone()
    }

    fn unmount(&mut self) {
        self.mounted = false;
        self.visible = false;
    }

    fn is_mounted(&self) -> bool {
        self.mounted
    }
}
