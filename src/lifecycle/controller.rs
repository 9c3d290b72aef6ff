//! Inline preview / fullscreen editor state machine.

use std::sync::Arc;
use std::time::Duration;

use crate::config::LifecycleConfig;
use crate::editor::{DimensionRestorer, EditorSurface, FontGate};
use crate::error::{Result, StreamError};
use crate::host::{DiagnosticLog, DisplayMode, HostTransport};
use crate::scene::{Element, Scene};

/// Where the diagram is presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EditorState {
    #[default]
    InlinePreview,
    /// Fonts and settle delay pending; surface not yet visible.
    EditorLoading,
    EditorSettled,
}

impl EditorState {
    pub fn display_mode(self) -> DisplayMode {
        match self {
            Self::InlinePreview => DisplayMode::Inline,
            Self::EditorLoading | Self::EditorSettled => DisplayMode::Fullscreen,
        }
    }
}

/// Who asked for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A user gesture. The host is asked to change mode first.
    User,
    /// The host already changed mode and is telling us.
    Host,
}

/// Result of a transition request.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Already in the requested mode, or the host declined.
    Unchanged,
    Entered,
    /// Left the editor. Carries the in-editor scene when the user changed it.
    Exited { edits: Option<Scene> },
}

pub struct ModeController {
    state: EditorState,
    editor: Box<dyn EditorSurface>,
    fonts: Arc<dyn FontGate>,
    restorer: Arc<dyn DimensionRestorer>,
    transport: Option<Arc<dyn HostTransport>>,
    settle_delay: Duration,
    log: DiagnosticLog,
    /// Scene the editor was loaded with, for edit detection on exit.
    loaded: Option<Scene>,
}

impl ModeController {
    pub fn new(
        config: &LifecycleConfig,
        editor: Box<dyn EditorSurface>,
        fonts: Arc<dyn FontGate>,
        restorer: Arc<dyn DimensionRestorer>,
        log: DiagnosticLog,
    ) -> Self {
        Self {
            state: EditorState::InlinePreview,
            editor,
            fonts,
            restorer,
            transport: None,
            settle_delay: config.settle_delay(),
            log: log.scoped("lifecycle"),
            loaded: None,
        }
    }

    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn HostTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn state(&self) -> EditorState {
        self.state
    }

    pub fn mode(&self) -> DisplayMode {
        self.state.display_mode()
    }

    pub fn editor(&self) -> &dyn EditorSurface {
        self.editor.as_ref()
    }

    pub fn editor_mut(&mut self) -> &mut dyn EditorSurface {
        self.editor.as_mut()
    }

    /// Move to fullscreen and load `scene` into the editor.
    ///
    /// Waits for fonts and the settle delay before mounting, refreshes text
    /// dimensions, applies the result without an undo entry, then reveals.
    pub async fn enter_fullscreen(
        &mut self,
        scene: &[Element],
        trigger: Trigger,
    ) -> Result<Transition> {
        if self.state != EditorState::InlinePreview {
            return Ok(Transition::Unchanged);
        }
        if trigger == Trigger::User && !self.ask_host(DisplayMode::Fullscreen).await? {
            return Ok(Transition::Unchanged);
        }

        self.state = EditorState::EditorLoading;
        tracing::debug!(mode = "fullscreen", "editor loading");
        self.fonts.ready().await;
        tokio::time::sleep(self.settle_delay).await;

        if let Err(e) = self.editor.mount() {
            self.log.error(&format!("editor mount failed: {e}"));
            self.state = EditorState::InlinePreview;
            return Err(e);
        }

        let refreshed = self.restorer.refresh(scene);
        self.editor.update_scene(refreshed.clone(), false);
        self.editor.reveal();
        self.loaded = Some(refreshed);
        self.state = EditorState::EditorSettled;
        tracing::info!(mode = "fullscreen", element_count = scene.len(), "editor settled");
        Ok(Transition::Entered)
    }

    /// Capture the editor scene and return to the inline preview.
    pub async fn exit_fullscreen(&mut self, trigger: Trigger) -> Result<Transition> {
        if self.state == EditorState::InlinePreview {
            return Ok(Transition::Unchanged);
        }
        if trigger == Trigger::User && !self.ask_host(DisplayMode::Inline).await? {
            return Ok(Transition::Unchanged);
        }

        let captured = self.editor.elements();
        let edits = match self.loaded.take() {
            Some(loaded) if loaded == captured => None,
            _ => Some(captured),
        };
        self.editor.unmount();
        self.state = EditorState::InlinePreview;
        tracing::info!(mode = "inline", edited = edits.is_some(), "editor closed");
        Ok(Transition::Exited { edits })
    }

    /// Switch to whichever mode we are not in.
    pub async fn toggle(&mut self, scene: &[Element], trigger: Trigger) -> Result<Transition> {
        match self.state {
            EditorState::InlinePreview => self.enter_fullscreen(scene, trigger).await,
            EditorState::EditorLoading | EditorState::EditorSettled => {
                self.exit_fullscreen(trigger).await
            }
        }
    }

    /// Ask the host to apply `mode`. `Ok(false)` if it applied something
    /// else; errors leave the state untouched.
    async fn ask_host(&self, mode: DisplayMode) -> Result<bool> {
        let Some(transport) = &self.transport else {
            return Ok(true);
        };
        match transport.request_display_mode(mode).await {
            Ok(applied) if applied == mode => Ok(true),
            Ok(applied) => {
                self.log.info(&format!(
                    "host kept {} instead of {}",
                    applied.as_str(),
                    mode.as_str()
                ));
                Ok(false)
            }
            Err(e) => {
                self.log.warn(&format!("display mode request failed: {e}"));
                Err(StreamError::Host(format!(
                    "display mode {} rejected: {e}",
                    mode.as_str()
                )))
            }
        }
    }
}

impl Drop for ModeController {
    fn drop(&mut self) {
        if self.editor.is_mounted() {
            self.editor.unmount();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::{HeadlessEditor, MetricRestorer, ReadyFonts};
    use crate::test_utils::ScriptedTransport;

    fn controller() -> ModeController {
        ModeController::new(
            &LifecycleConfig { settle_delay_ms: 0 },
            Box::new(HeadlessEditor::new()),
            Arc::new(ReadyFonts),
            Arc::new(MetricRestorer),
            DiagnosticLog::local(),
        )
    }

    fn scene() -> Scene {
        let mut text = Element::new("t", "text", 0.0, 0.0).with_size(1.0, 1.0);
        text.text = Some("abc".into());
        vec![Element::new("r", "rectangle", 0.0, 0.0).with_size(10.0, 10.0), text]
    }

    #[tokio::test]
    async fn enter_refreshes_and_reveals() {
        let mut ctl = controller();
        let out = ctl.enter_fullscreen(&scene(), Trigger::Host).await.expect("enter in test");
        assert_eq!(out, Transition::Entered);
        assert_eq!(ctl.state(), EditorState::EditorSettled);
        assert_eq!(ctl.mode(), DisplayMode::Fullscreen);
        let loaded = ctl.editor().elements();
        assert_eq!(loaded[1].width, Some(36.0));
        assert!(ctl.editor().is_mounted());
    }

    #[tokio::test]
    async fn repeated_notifications_are_noops() {
        let mut ctl = controller();
        ctl.enter_fullscreen(&scene(), Trigger::Host).await.expect("enter in test");
        let again = ctl.enter_fullscreen(&scene(), Trigger::Host).await.expect("enter in test");
        assert_eq!(again, Transition::Unchanged);

        ctl.exit_fullscreen(Trigger::Host).await.expect("exit in test");
        let again = ctl.exit_fullscreen(Trigger::Host).await.expect("exit in test");
        assert_eq!(again, Transition::Unchanged);
        assert_eq!(ctl.state(), EditorState::InlinePreview);
    }

    #[tokio::test]
    async fn round_trip_without_edits_reports_none() {
        let mut ctl = controller();
        ctl.toggle(&scene(), Trigger::Host).await.expect("enter in test");
        let out = ctl.toggle(&scene(), Trigger::Host).await.expect("exit in test");
        assert_eq!(out, Transition::Exited { edits: None });
        assert!(!ctl.editor().is_mounted());
    }

    #[tokio::test]
    async fn edits_are_captured_on_exit() {
        let mut ctl = controller();
        ctl.enter_fullscreen(&scene(), Trigger::Host).await.expect("enter in test");
        let mut edited = ctl.editor().elements();
        edited[0].x = 42.0;
        ctl.editor_mut().update_scene(edited.clone(), true);
        let out = ctl.exit_fullscreen(Trigger::Host).await.expect("exit in test");
        assert_eq!(out, Transition::Exited { edits: Some(edited) });
    }

    #[tokio::test]
    async fn mount_failure_stays_inline() {
        let mut ctl = ModeController::new(
            &LifecycleConfig { settle_delay_ms: 0 },
            Box::new(HeadlessEditor::failing()),
            Arc::new(ReadyFonts),
            Arc::new(MetricRestorer),
            DiagnosticLog::local(),
        );
        assert!(ctl.enter_fullscreen(&scene(), Trigger::Host).await.is_err());
        assert_eq!(ctl.state(), EditorState::InlinePreview);
    }

    #[tokio::test]
    async fn host_rejection_leaves_state_unchanged() {
        let transport = Arc::new(ScriptedTransport::rejecting());
        let mut ctl = controller().with_transport(transport.clone());
        let result = ctl.enter_fullscreen(&scene(), Trigger::User).await;
        assert!(matches!(result, Err(StreamError::Host(_))));
        assert_eq!(ctl.state(), EditorState::InlinePreview);
        assert_eq!(transport.mode_requests(), vec![DisplayMode::Fullscreen]);
    }

    #[tokio::test]
    async fn host_notification_skips_mode_request() {
        let transport = Arc::new(ScriptedTransport::accepting());
        let mut ctl = controller().with_transport(transport.clone());
        ctl.enter_fullscreen(&scene(), Trigger::Host).await.expect("enter in test");
        assert!(transport.mode_requests().is_empty());
        ctl.exit_fullscreen(Trigger::User).await.expect("exit in test");
        assert_eq!(transport.mode_requests(), vec![DisplayMode::Inline]);
    }

    #[tokio::test]
    async fn settle_delay_precedes_mount() {
        let mut ctl = ModeController::new(
            &LifecycleConfig { settle_delay_ms: 20 },
            Box::new(HeadlessEditor::new()),
            Arc::new(ReadyFonts),
            Arc::new(MetricRestorer),
            DiagnosticLog::local(),
        );
        let start = std::time::Instant::now();
        ctl.enter_fullscreen(&scene(), Trigger::Host).await.expect("enter in test");
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
