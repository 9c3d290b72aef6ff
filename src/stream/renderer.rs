//! Streaming render loop.
//!
//! Each tool-input chunk re-sends the whole element array so far. Partial
//! chunks render only settled elements and only when new ones arrived;
//! the final chunk renders everything and becomes the authoritative scene.
//!
//! All state lives in one [`StreamRenderer`] driven through `&mut self`, so
//! a cycle always acts on the state it observes after its own awaits.

use std::sync::Arc;

use serde_json::Value;

use super::surface::{PatchStats, RenderedSurface};
use crate::checkpoint::{CheckpointStore, Reconciled, Reconciler};
use crate::config::InkConfig;
use crate::editor::{
    EditCapture, ExportOptions, FeedbackSink, FontGate, SceneConverter, SceneExporter,
};
use crate::error::{Result, StreamError};
use crate::host::DiagnosticLog;
use crate::scene::{
    Classified, Scene, ViewportRect, classify, compute_bounds, map_to_render_space,
    normalize_aspect, recover_elements, recover_settled_elements,
};
use crate::viewport::CameraDriver;

/// External capabilities the render loop drives.
#[derive(Clone)]
pub struct RenderCapabilities {
    pub converter: Arc<dyn SceneConverter>,
    pub exporter: Arc<dyn SceneExporter>,
    pub fonts: Arc<dyn FontGate>,
    pub feedback: Arc<dyn FeedbackSink>,
    pub capture: Arc<dyn EditCapture>,
    pub store: Arc<dyn CheckpointStore>,
}

/// Outcome of one tool-input event.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Nothing new to draw.
    Skipped,
    /// A frame was exported and patched onto the surface.
    Rendered {
        frame: u64,
        element_count: usize,
        stats: PatchStats,
    },
    /// Export rejected the scene; the next chunk will try again.
    ExportFailed,
}

impl CycleOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, Self::Rendered { .. })
    }
}

pub struct StreamRenderer {
    caps: RenderCapabilities,
    export_options: ExportOptions,
    aspect_tolerance: f64,
    default_viewport: ViewportRect,
    reconciler: Reconciler,
    surface: RenderedSurface,
    camera: CameraDriver,
    log: DiagnosticLog,
    /// Drawables seen by the last partial cycle of the current stream.
    rendered_count: usize,
    base_rendered: bool,
    /// Scene of the last successful render.
    last_scene: Option<Scene>,
    /// Scene-space viewport of the last successful render.
    last_viewport: Option<ViewportRect>,
    authoritative: Option<Scene>,
    user_edits: Option<Scene>,
    closed: bool,
}

impl StreamRenderer {
    pub fn new(config: &InkConfig, caps: RenderCapabilities, log: DiagnosticLog) -> Self {
        let reconciler = Reconciler::new(Arc::clone(&caps.store), Arc::clone(&caps.converter));
        Self {
            export_options: ExportOptions {
                padding: config.render.export_padding,
                background: config.render.background.clone(),
            },
            aspect_tolerance: config.viewport.aspect_tolerance,
            default_viewport: config.viewport.default_viewport,
            reconciler,
            surface: RenderedSurface::new(),
            camera: CameraDriver::new(&config.viewport),
            log: log.scoped("render"),
            rendered_count: 0,
            base_rendered: false,
            last_scene: None,
            last_viewport: None,
            authoritative: None,
            user_edits: None,
            caps,
            closed: false,
        }
    }

    pub fn surface(&self) -> &RenderedSurface {
        &self.surface
    }

    pub fn camera(&self) -> &CameraDriver {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut CameraDriver {
        &mut self.camera
    }

    /// Scene of the most recent successful render.
    pub fn last_scene(&self) -> Option<&Scene> {
        self.last_scene.as_ref()
    }

    /// Scene produced by the last final chunk.
    pub fn authoritative(&self) -> Option<&Scene> {
        self.authoritative.as_ref()
    }

    pub fn user_edits(&self) -> Option<&Scene> {
        self.user_edits.as_ref()
    }

    /// The scene the editor and checkpoints should see: user edits when
    /// present, the streamed result otherwise.
    pub fn current_scene(&self) -> Option<&Scene> {
        self.user_edits.as_ref().or(self.authoritative.as_ref())
    }

    /// Record in-editor edits as the authoritative user scene.
    pub fn apply_user_edits(&mut self, scene: Scene) {
        tracing::debug!(element_count = scene.len(), "user edits captured");
        self.user_edits = Some(scene);
    }

    /// Forget per-stream counters so the next chunk starts a new stream.
    pub fn begin_stream(&mut self) {
        self.rendered_count = 0;
        self.base_rendered = false;
    }

    /// Handle a `tool_input_partial` event.
    pub async fn on_partial(&mut self, args: &Value) -> Result<CycleOutcome> {
        let values = tool_elements(args, true)?;
        let classified = classify(values);
        let drawn = classified.draw_elements.len();

        if drawn < self.rendered_count {
            // The array shrank: a new tool call started streaming.
            self.begin_stream();
        }

        let reconciled = self.reconcile(&classified).await?;

        if drawn > self.rendered_count {
            for el in &classified.draw_elements.as_slice()[self.rendered_count..] {
                self.caps.feedback.stroke(&el.kind);
            }
            self.rendered_count = drawn;
            let viewport = classified.viewport.or(reconciled.base_viewport);
            let mut scene = reconciled.scene;
            reseed(&mut scene);
            return Ok(self.render(scene, viewport).await);
        }

        if drawn == 0 && reconciled.has_base() && !self.base_rendered {
            self.base_rendered = true;
            let viewport = classified.viewport.or(reconciled.base_viewport);
            return Ok(self.render(reconciled.scene, viewport).await);
        }

        Ok(CycleOutcome::Skipped)
    }

    /// Handle a final `tool_input` event.
    pub async fn on_final(&mut self, args: &Value) -> Result<CycleOutcome> {
        let values = tool_elements(args, false)?;
        let classified = classify(values);
        let reconciled = self.reconcile(&classified).await?;
        let viewport = classified.viewport.or(reconciled.base_viewport);
        let scene = reconciled.scene;

        tracing::info!(
            element_count = scene.len(),
            base_len = reconciled.base_len,
            "stream complete"
        );
        // Edits were made to the previous scene; the new stream replaces it.
        if self.user_edits.take().is_some() {
            tracing::debug!("discarding user edits superseded by a new stream");
        }
        self.authoritative = Some(scene.clone());
        self.caps.capture.on_authoritative(&scene);
        self.begin_stream();
        Ok(self.render(scene, viewport).await)
    }

    /// Render `scene` and move the camera onto `viewport` (or the default).
    pub async fn render(&mut self, scene: Scene, viewport: Option<ViewportRect>) -> CycleOutcome {
        if self.closed {
            return CycleOutcome::Skipped;
        }
        self.camera.cancel_pending();
        self.caps.fonts.ready().await;

        let image = match self.caps.exporter.export(&scene, &self.export_options).await {
            Ok(image) => image,
            Err(e) => {
                self.log.debug(&format!("export skipped: {e}"));
                return CycleOutcome::ExportFailed;
            }
        };
        if self.closed {
            return CycleOutcome::Skipped;
        }

        let stats = self.surface.patch(image);
        let origin = compute_bounds(&scene);
        let view = normalize_aspect(
            viewport.unwrap_or(self.default_viewport),
            self.aspect_tolerance,
        );
        self.camera
            .set_target(map_to_render_space(view, origin, self.export_options.padding));

        let element_count = scene.len();
        self.last_scene = Some(scene);
        self.last_viewport = viewport;
        CycleOutcome::Rendered {
            frame: self.surface.frame(),
            element_count,
            stats,
        }
    }

    /// Re-render the current scene under the last viewport, e.g. after
    /// user edits come back from the editor.
    pub async fn redraw_current(&mut self) -> CycleOutcome {
        let Some(scene) = self.current_scene().cloned() else {
            return CycleOutcome::Skipped;
        };
        let viewport = self.last_viewport;
        self.render(scene, viewport).await
    }

    /// Tear down: stop the camera and ignore any later render.
    pub fn shutdown(&mut self) {
        self.closed = true;
        self.camera.shutdown();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    async fn reconcile(&mut self, classified: &Classified) -> Result<Reconciled> {
        self.reconciler
            .reconcile(
                classified.restore_id.as_deref(),
                &classified.delete_ids,
                &classified.draw_elements,
            )
            .await
            .inspect_err(|e| self.log.warn(&format!("reconcile failed: {e}")))
    }
}

/// Pull the element list out of tool arguments.
///
/// `elements` may be a JSON string (streamed text, possibly truncated) or
/// an already-parsed array. With `settled`, the trailing element is dropped
/// because it may still be mid-write.
pub fn tool_elements(args: &Value, settled: bool) -> Result<Vec<Value>> {
    match args.get("elements") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(text)) => Ok(if settled {
            recover_settled_elements(text)
        } else {
            recover_elements(text)
        }),
        Some(Value::Array(items)) => {
            let mut items = items.clone();
            if settled {
                items.pop();
            }
            Ok(items)
        }
        Some(other) => Err(StreamError::Parse(format!(
            "elements must be a string or array, got {other}"
        ))),
    }
}

/// Fresh hand-drawn jitter for every element.
fn reseed(scene: &mut Scene) {
    for el in scene.iter_mut() {
        el.seed = Some(u64::from(rand::random::<u32>() >> 1) + 1);
    }
}
