//! Shared test utilities used across unit and integration tests.
//!
//! Recording fakes for the editor and host capabilities, plus a
//! [`TestRig`] that wires them into a [`StreamRenderer`].

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::checkpoint::MemoryCheckpointStore;
use crate::config::InkConfig;
use crate::editor::{
    ExportOptions, FeedbackSink, FontGate, RenderedImage, SceneExporter, SceneSlot,
    ShorthandConverter, SvgExporter,
};
use crate::error::{Result, StreamError};
use crate::host::{DiagnosticLog, DisplayMode, HostTransport, LogLevel, OutboundKind};
use crate::scene::{Element, Scene};
use crate::stream::{RenderCapabilities, StreamRenderer};

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match m.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Config with a 1 ms frame clock and no settle delay.
pub fn fast_config() -> InkConfig {
    let mut config = InkConfig::default();
    config.viewport.frame_interval_ms = 1;
    config.lifecycle.settle_delay_ms = 0;
    config
}

/// Exporter that records every scene it is asked to render.
#[derive(Clone, Default)]
pub struct RecordingExporter {
    scenes: Arc<Mutex<Vec<Scene>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// An exporter that rejects every scene.
    pub fn failing() -> Self {
        Self {
            fail: Arc::new(AtomicBool::new(true)),
            ..Self::default()
        }
    }

    /// Start or stop rejecting scenes. Shared by every clone.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        lock(&self.scenes).len()
    }

    pub fn scenes(&self) -> Vec<Scene> {
        lock(&self.scenes).clone()
    }

    /// Element ids of each exported scene, in call order.
    pub fn rendered_ids(&self) -> Vec<Vec<String>> {
        lock(&self.scenes)
            .iter()
            .map(|s| s.iter().map(|e| e.id.clone()).collect())
            .collect()
    }
}

#[async_trait]
impl SceneExporter for RecordingExporter {
    async fn export(&self, scene: &[Element], options: &ExportOptions) -> Result<RenderedImage> {
        lock(&self.scenes).push(scene.to_vec());
        if self.fail.load(Ordering::SeqCst) {
            return Err(StreamError::Export("scripted export failure".into()));
        }
        SvgExporter.export(scene, options).await
    }
}

/// Feedback sink that records element kinds.
#[derive(Clone, Default)]
pub struct RecordingFeedback {
    strokes: Arc<Mutex<Vec<String>>>,
}

impl RecordingFeedback {
    pub fn strokes(&self) -> Vec<String> {
        lock(&self.strokes).clone()
    }
}

impl FeedbackSink for RecordingFeedback {
    fn stroke(&self, element_kind: &str) {
        lock(&self.strokes).push(element_kind.to_owned());
    }
}

/// Font gate that is always ready and counts how often it was awaited.
#[derive(Clone, Default)]
pub struct CountingFonts {
    waits: Arc<AtomicUsize>,
}

impl CountingFonts {
    pub fn waits(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FontGate for CountingFonts {
    async fn ready(&self) {
        self.waits.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct TransportLog {
    mode_requests: Vec<DisplayMode>,
    tool_calls: Vec<(String, Value)>,
    links: Vec<String>,
    logs: Vec<(LogLevel, String)>,
    events: Vec<(OutboundKind, Value)>,
}

/// In-process host that answers requests from a script.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    log: Arc<Mutex<TransportLog>>,
    reject: bool,
}

impl ScriptedTransport {
    /// Host that grants every request.
    pub fn accepting() -> Self {
        Self::default()
    }

    /// Host that rejects every request.
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub fn mode_requests(&self) -> Vec<DisplayMode> {
        lock(&self.log).mode_requests.clone()
    }

    pub fn tool_calls(&self) -> Vec<(String, Value)> {
        lock(&self.log).tool_calls.clone()
    }

    pub fn links(&self) -> Vec<String> {
        lock(&self.log).links.clone()
    }

    pub fn logs(&self) -> Vec<(LogLevel, String)> {
        lock(&self.log).logs.clone()
    }

    pub fn events(&self) -> Vec<(OutboundKind, Value)> {
        lock(&self.log).events.clone()
    }

    pub fn events_of(&self, kind: OutboundKind) -> Vec<Value> {
        lock(&self.log)
            .events
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, v)| v.clone())
            .collect()
    }

    fn outcome(&self) -> Result<()> {
        if self.reject {
            Err(StreamError::Host("scripted rejection".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl HostTransport for ScriptedTransport {
    async fn request_display_mode(&self, mode: DisplayMode) -> Result<DisplayMode> {
        lock(&self.log).mode_requests.push(mode);
        self.outcome().map(|()| mode)
    }

    async fn call_server_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        lock(&self.log).tool_calls.push((name.to_owned(), arguments));
        self.outcome().map(|()| Value::Null)
    }

    async fn open_link(&self, url: &str) -> Result<()> {
        crate::host::validate_link(url)?;
        lock(&self.log).links.push(url.to_owned());
        self.outcome()
    }

    fn send_log(&self, level: LogLevel, message: &str) -> Result<()> {
        lock(&self.log).logs.push((level, message.to_owned()));
        Ok(())
    }

    async fn emit(&self, kind: OutboundKind, payload: Value) -> Result<()> {
        lock(&self.log).events.push((kind, payload));
        Ok(())
    }
}

/// Recording collaborators for a [`StreamRenderer`].
#[derive(Clone)]
pub struct TestRig {
    pub config: InkConfig,
    pub exporter: RecordingExporter,
    pub feedback: RecordingFeedback,
    pub fonts: CountingFonts,
    pub capture: SceneSlot,
    pub store: MemoryCheckpointStore,
}

impl Default for TestRig {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRig {
    pub fn new() -> Self {
        Self::with_exporter(RecordingExporter::new())
    }

    pub fn with_exporter(exporter: RecordingExporter) -> Self {
        Self {
            config: fast_config(),
            exporter,
            feedback: RecordingFeedback::default(),
            fonts: CountingFonts::default(),
            capture: SceneSlot::new(),
            store: MemoryCheckpointStore::new(),
        }
    }

    #[must_use]
    pub fn with_feedback(mut self, feedback: RecordingFeedback) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn capabilities(&self) -> RenderCapabilities {
        RenderCapabilities {
            converter: Arc::new(ShorthandConverter::from_config(&self.config.render)),
            exporter: Arc::new(self.exporter.clone()),
            fonts: Arc::new(self.fonts.clone()),
            feedback: Arc::new(self.feedback.clone()),
            capture: Arc::new(self.capture.clone()),
            store: Arc::new(self.store.clone()),
        }
    }

    pub fn renderer(&self) -> StreamRenderer {
        StreamRenderer::new(&self.config, self.capabilities(), DiagnosticLog::local())
    }
}
