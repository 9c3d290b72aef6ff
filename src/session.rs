//! Diagram session: one live diagram driven by host events.
//!
//! The session owns the render loop, the mode controller, and the
//! checkpoint store, and is the single writer of their state. Every inbound
//! [`HostEnvelope`] is handled to completion before the next one.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::watch;

use crate::checkpoint::{CheckpointPayload, CheckpointStore};
use crate::config::InkConfig;
use crate::editor::{
    DimensionRestorer, EditorSurface, HeadlessEditor, MetricRestorer, NoopFeedback, ReadyFonts,
    SceneSlot, ShorthandConverter, SvgExporter,
};
use crate::error::{Result, StreamError};
use crate::host::contract::{ContainerDimensions, FramePayload};
use crate::host::{
    DiagnosticLog, DisplayMode, HostContext, HostEnvelope, HostTransport, InboundKind,
    OutboundKind, UserAction, checkpoint_id_of,
};
use crate::lifecycle::{EditorState, ModeController, Transition, Trigger};
use crate::scene::{Scene, ViewportRect};
use crate::stream::{CycleOutcome, RenderCapabilities, StreamRenderer};

/// Zoom step applied by one zoom gesture.
const ZOOM_STEP: f64 = 1.25;

/// Everything a session needs besides config and transport.
pub struct SessionParts {
    pub render: RenderCapabilities,
    pub restorer: Arc<dyn DimensionRestorer>,
    pub editor: Box<dyn EditorSurface>,
}

impl SessionParts {
    /// Reference implementations: SVG export, fixed-metric text, in-memory
    /// editor.
    pub fn headless(config: &InkConfig, store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            render: RenderCapabilities {
                converter: Arc::new(ShorthandConverter::from_config(&config.render)),
                exporter: Arc::new(SvgExporter),
                fonts: Arc::new(ReadyFonts),
                feedback: Arc::new(NoopFeedback),
                capture: Arc::new(SceneSlot::new()),
                store,
            },
            restorer: Arc::new(MetricRestorer),
            editor: Box::new(HeadlessEditor::new()),
        }
    }
}

pub struct DiagramSession {
    renderer: StreamRenderer,
    modes: ModeController,
    store: Arc<dyn CheckpointStore>,
    transport: Arc<dyn HostTransport>,
    log: DiagnosticLog,
    container: Option<ContainerDimensions>,
}

impl DiagramSession {
    pub fn new(config: &InkConfig, parts: SessionParts, transport: Arc<dyn HostTransport>) -> Self {
        let log = DiagnosticLog::forwarding(Arc::clone(&transport));
        let store = Arc::clone(&parts.render.store);
        let fonts = Arc::clone(&parts.render.fonts);
        let renderer = StreamRenderer::new(config, parts.render, log.clone());
        let modes = ModeController::new(
            &config.lifecycle,
            parts.editor,
            fonts,
            parts.restorer,
            log.clone(),
        )
        .with_transport(Arc::clone(&transport));

        Self {
            renderer,
            modes,
            store,
            transport,
            log: log.scoped("session"),
            container: None,
        }
    }

    pub fn renderer(&self) -> &StreamRenderer {
        &self.renderer
    }

    pub fn modes(&self) -> &ModeController {
        &self.modes
    }

    pub fn modes_mut(&mut self) -> &mut ModeController {
        &mut self.modes
    }

    pub fn state(&self) -> EditorState {
        self.modes.state()
    }

    pub fn container(&self) -> Option<ContainerDimensions> {
        self.container
    }

    /// The scene the editor opens on and checkpoints persist.
    pub fn current_scene(&self) -> Scene {
        self.renderer
            .current_scene()
            .or(self.renderer.last_scene())
            .cloned()
            .unwrap_or_default()
    }

    /// Animated view box updates (render space, zoom applied).
    pub fn subscribe_viewport(&self) -> watch::Receiver<Option<ViewportRect>> {
        self.renderer.camera().subscribe()
    }

    /// Handle one inbound envelope.
    ///
    /// Recoverable failures are logged and absorbed here; only
    /// unrecoverable errors are returned.
    pub async fn handle(&mut self, envelope: HostEnvelope) -> Result<()> {
        let kind = envelope.kind;
        match self.dispatch(envelope).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_recoverable() => {
                self.log
                    .warn(&format!("{} handling failed: {e}", kind.as_str()));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn dispatch(&mut self, envelope: HostEnvelope) -> Result<()> {
        envelope
            .validate()
            .map_err(|e| StreamError::Parse(format!("invalid host envelope: {e}")))?;

        match envelope.kind {
            InboundKind::ToolInputPartial => {
                let outcome = self.renderer.on_partial(&envelope.payload).await?;
                self.publish(outcome).await
            }
            InboundKind::ToolInput => {
                let outcome = self.renderer.on_final(&envelope.payload).await?;
                self.publish(outcome).await
            }
            InboundKind::ToolResult => self.on_tool_result(&envelope.payload).await,
            InboundKind::HostContextChanged => {
                let context: HostContext = serde_json::from_value(envelope.payload)
                    .map_err(|e| StreamError::Parse(format!("invalid host context: {e}")))?;
                self.on_host_context(context).await
            }
            InboundKind::UserAction => {
                let action: UserAction = serde_json::from_value(envelope.payload)
                    .map_err(|e| StreamError::Parse(format!("invalid user action: {e}")))?;
                self.on_user_action(action).await
            }
            InboundKind::Response => {
                tracing::debug!(request_id = ?envelope.request_id, "late response ignored");
                Ok(())
            }
        }
    }

    async fn on_tool_result(&mut self, result: &serde_json::Value) -> Result<()> {
        let Some(id) = checkpoint_id_of(result) else {
            return Ok(());
        };
        let scene = self.current_scene();
        let element_count = scene.len();
        self.store
            .save(&id, &CheckpointPayload::new(scene))
            .await?;
        tracing::info!(checkpoint_id = %id, element_count, "checkpoint saved");
        Ok(())
    }

    async fn on_host_context(&mut self, context: HostContext) -> Result<()> {
        if let Some(dims) = context.container_dimensions {
            self.container = Some(dims);
        }
        match context.display_mode {
            Some(DisplayMode::Fullscreen) => {
                let scene = self.current_scene();
                self.modes.enter_fullscreen(&scene, Trigger::Host).await?;
            }
            Some(DisplayMode::Inline) => {
                let transition = self.modes.exit_fullscreen(Trigger::Host).await?;
                self.absorb(transition).await?;
            }
            None => {}
        }
        Ok(())
    }

    async fn on_user_action(&mut self, action: UserAction) -> Result<()> {
        match action {
            UserAction::ToggleFullscreen => {
                let scene = self.current_scene();
                let transition = self.modes.toggle(&scene, Trigger::User).await?;
                self.absorb(transition).await
            }
            UserAction::Escape => {
                let transition = self.modes.exit_fullscreen(Trigger::User).await?;
                self.absorb(transition).await
            }
            UserAction::ZoomIn => {
                self.renderer.camera_mut().zoom_by(ZOOM_STEP);
                Ok(())
            }
            UserAction::ZoomOut => {
                self.renderer.camera_mut().zoom_by(1.0 / ZOOM_STEP);
                Ok(())
            }
            UserAction::ResetZoom => {
                self.renderer.camera_mut().reset_zoom();
                Ok(())
            }
            UserAction::Pan { dx, dy } => {
                self.renderer.camera_mut().pan_by(dx, dy);
                Ok(())
            }
            UserAction::OpenLink { url } => self.transport.open_link(&url).await,
        }
    }

    /// Feed edits captured on editor exit back into the pipeline.
    async fn absorb(&mut self, transition: Transition) -> Result<()> {
        if let Transition::Exited { edits: Some(edits) } = transition {
            self.renderer.apply_user_edits(edits);
            let outcome = self.renderer.redraw_current().await;
            self.publish(outcome).await?;
        }
        Ok(())
    }

    async fn publish(&self, outcome: CycleOutcome) -> Result<()> {
        let CycleOutcome::Rendered {
            frame,
            element_count,
            ..
        } = outcome
        else {
            return Ok(());
        };
        let payload = FramePayload {
            frame,
            element_count,
            svg: self.renderer.surface().to_svg(),
        };
        self.transport
            .emit(OutboundKind::RenderFrame, json!(payload))
            .await
    }

    /// Stop animation and unmount the editor.
    pub fn shutdown(&mut self) {
        self.renderer.shutdown();
        if self.modes.editor().is_mounted() {
            self.modes.editor_mut().unmount();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::MemoryCheckpointStore;
    use crate::test_utils::{ScriptedTransport, fast_config};

    fn session() -> (DiagramSession, ScriptedTransport, MemoryCheckpointStore) {
        let config = fast_config();
        let store = MemoryCheckpointStore::new();
        let transport = ScriptedTransport::accepting();
        let parts = SessionParts::headless(&config, Arc::new(store.clone()));
        let session = DiagramSession::new(&config, parts, Arc::new(transport.clone()));
        (session, transport, store)
    }

    fn final_input() -> HostEnvelope {
        HostEnvelope::new(
            InboundKind::ToolInput,
            json!({"elements": [
                {"type":"rectangle","id":"r","x":0,"y":0,"width":50,"height":30},
                {"type":"text","id":"t","x":5,"y":5,"text":"hello"}
            ]}),
        )
    }

    #[tokio::test]
    async fn final_input_emits_a_frame() {
        let (mut session, transport, _) = session();
        session.handle(final_input()).await.expect("handle in test");
        let frames = transport.events_of(OutboundKind::RenderFrame);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["element_count"], 2);
        assert!(frames[0]["svg"].as_str().is_some_and(|s| s.contains("data-id=\"r\"")));
    }

    #[tokio::test]
    async fn tool_result_saves_checkpoint() {
        let (mut session, _, store) = session();
        session.handle(final_input()).await.expect("handle in test");
        session
            .handle(HostEnvelope::new(
                InboundKind::ToolResult,
                json!({"checkpointId": "cp-7"}),
            ))
            .await
            .expect("handle in test");
        let saved = store.load("cp-7").await.expect("load in test").expect("saved in test");
        assert_eq!(saved.elements.len(), 2);
    }

    #[tokio::test]
    async fn invalid_checkpoint_id_is_absorbed() {
        let (mut session, transport, store) = session();
        session
            .handle(HostEnvelope::new(
                InboundKind::ToolResult,
                json!({"checkpointId": "../../etc"}),
            ))
            .await
            .expect("recoverable errors are absorbed");
        assert!(store.is_empty().await);
        assert!(!transport.logs().is_empty());
    }

    #[tokio::test]
    async fn host_mode_change_round_trip_keeps_scene() {
        let (mut session, transport, _) = session();
        session.handle(final_input()).await.expect("handle in test");
        let before = session.current_scene();

        for mode in ["fullscreen", "fullscreen", "inline", "inline"] {
            session
                .handle(HostEnvelope::new(
                    InboundKind::HostContextChanged,
                    json!({"displayMode": mode}),
                ))
                .await
                .expect("handle in test");
        }
        assert_eq!(session.state(), EditorState::InlinePreview);
        assert_eq!(session.current_scene(), before);
        assert!(session.renderer().user_edits().is_none());
        assert!(transport.mode_requests().is_empty());
    }

    #[tokio::test]
    async fn user_toggle_asks_host() {
        let (mut session, transport, _) = session();
        session.handle(final_input()).await.expect("handle in test");
        let toggle = HostEnvelope::new(InboundKind::UserAction, json!({"action": "toggle_fullscreen"}));
        session.handle(toggle.clone()).await.expect("handle in test");
        assert_eq!(session.state(), EditorState::EditorSettled);
        session
            .handle(HostEnvelope::new(InboundKind::UserAction, json!({"action": "escape"})))
            .await
            .expect("handle in test");
        assert_eq!(session.state(), EditorState::InlinePreview);
        assert_eq!(
            transport.mode_requests(),
            vec![DisplayMode::Fullscreen, DisplayMode::Inline]
        );
    }

    #[tokio::test]
    async fn edits_flow_back_on_exit() {
        let (mut session, transport, _) = session();
        session.handle(final_input()).await.expect("handle in test");
        session
            .handle(HostEnvelope::new(
                InboundKind::HostContextChanged,
                json!({"displayMode": "fullscreen"}),
            ))
            .await
            .expect("handle in test");

        let mut edited = session.modes().editor().elements();
        edited.retain(|e| e.id != "t");
        session.modes_mut().editor_mut().update_scene(edited.clone(), true);

        session
            .handle(HostEnvelope::new(
                InboundKind::HostContextChanged,
                json!({"displayMode": "inline", "containerDimensions": {"width": 640, "height": 480}}),
            ))
            .await
            .expect("handle in test");
        assert_eq!(session.renderer().user_edits(), Some(&edited));
        assert_eq!(session.current_scene().len(), 1);
        assert_eq!(transport.events_of(OutboundKind::RenderFrame).len(), 2);
        assert_eq!(session.container().map(|c| c.width), Some(640.0));
    }

    #[tokio::test]
    async fn restore_after_edits_checkpoints_the_new_stream() {
        let (mut session, _, store) = session();
        let mode = |m: &str| {
            HostEnvelope::new(InboundKind::HostContextChanged, json!({"displayMode": m}))
        };
        let saved_as =
            |id: &str| HostEnvelope::new(InboundKind::ToolResult, json!({"checkpointId": id}));

        session
            .handle(HostEnvelope::new(
                InboundKind::ToolInput,
                json!({"elements": [{"type":"rectangle","id":"a","x":0,"y":0,"width":40,"height":30}]}),
            ))
            .await
            .expect("handle in test");
        session.handle(saved_as("cp1")).await.expect("handle in test");

        session.handle(mode("fullscreen")).await.expect("handle in test");
        let mut edited = session.modes().editor().elements();
        edited[0].x = 42.0;
        session.modes_mut().editor_mut().update_scene(edited, true);
        session.handle(mode("inline")).await.expect("handle in test");
        assert!(session.renderer().user_edits().is_some());

        session
            .handle(HostEnvelope::new(
                InboundKind::ToolInput,
                json!({"elements": [
                    {"type":"restoreCheckpoint","id":"cp1"},
                    {"type":"ellipse","id":"b","x":60,"y":0,"width":30,"height":30}
                ]}),
            ))
            .await
            .expect("handle in test");
        session.handle(saved_as("cp2")).await.expect("handle in test");

        let saved = store.load("cp2").await.expect("load in test").expect("saved in test");
        let ids: Vec<&str> = saved.elements.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[tokio::test]
    async fn zoom_actions_adjust_camera() {
        let (mut session, _, _) = session();
        session.handle(final_input()).await.expect("handle in test");
        session
            .handle(HostEnvelope::new(InboundKind::UserAction, json!({"action": "zoom_in"})))
            .await
            .expect("handle in test");
        assert!((session.renderer().camera().zoom().scale - ZOOM_STEP).abs() < 1e-9);
        session
            .handle(HostEnvelope::new(InboundKind::UserAction, json!({"action": "reset_zoom"})))
            .await
            .expect("handle in test");
        assert!(session.renderer().camera().zoom().is_identity());
    }

    #[tokio::test]
    async fn open_link_goes_through_transport() {
        let (mut session, transport, _) = session();
        session
            .handle(HostEnvelope::new(
                InboundKind::UserAction,
                json!({"action": "open_link", "url": "https://example.com"}),
            ))
            .await
            .expect("handle in test");
        assert_eq!(transport.links(), vec!["https://example.com".to_owned()]);
    }
}
