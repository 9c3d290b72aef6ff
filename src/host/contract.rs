//! Versioned host event/request envelopes for the diagram bridge.
//!
//! Inbound traffic is one [`HostEnvelope`] per line: tool-call events,
//! host context changes, and responses to our requests. Outbound traffic
//! is one [`OutboundEnvelope`] per line: requests that expect a response,
//! log notifications, and render events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scene::ViewportRect;

/// Contract version for host envelopes.
pub const EVENT_VERSION: u32 = 1;

/// Inbound message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InboundKind {
    #[serde(rename = "tool_input_partial")]
    ToolInputPartial,
    #[serde(rename = "tool_input")]
    ToolInput,
    #[serde(rename = "tool_result")]
    ToolResult,
    #[serde(rename = "host_context_changed")]
    HostContextChanged,
    /// A user gesture forwarded by the host UI.
    #[serde(rename = "user_action")]
    UserAction,
    /// Answer to an [`OutboundKind`] request, matched by `request_id`.
    #[serde(rename = "response")]
    Response,
}

impl InboundKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ToolInputPartial => "tool_input_partial",
            Self::ToolInput => "tool_input",
            Self::ToolResult => "tool_result",
            Self::HostContextChanged => "host_context_changed",
            Self::UserAction => "user_action",
            Self::Response => "response",
        }
    }
}

/// Outbound message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboundKind {
    #[serde(rename = "request_display_mode")]
    RequestDisplayMode,
    #[serde(rename = "call_server_tool")]
    CallServerTool,
    #[serde(rename = "open_link")]
    OpenLink,
    #[serde(rename = "send_log")]
    SendLog,
    #[serde(rename = "render.frame")]
    RenderFrame,
    #[serde(rename = "render.viewport")]
    RenderViewport,
    #[serde(rename = "session.error")]
    SessionError,
}

impl OutboundKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RequestDisplayMode => "request_display_mode",
            Self::CallServerTool => "call_server_tool",
            Self::OpenLink => "open_link",
            Self::SendLog => "send_log",
            Self::RenderFrame => "render.frame",
            Self::RenderViewport => "render.viewport",
            Self::SessionError => "session.error",
        }
    }

    /// Whether the host is expected to answer with a `response`.
    #[must_use]
    pub fn expects_response(self) -> bool {
        matches!(
            self,
            Self::RequestDisplayMode | Self::CallServerTool | Self::OpenLink
        )
    }
}

/// A versioned envelope from host -> bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostEnvelope {
    pub v: u32,
    pub kind: InboundKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HostEnvelope {
    #[must_use]
    pub fn new(kind: InboundKind, payload: Value) -> Self {
        Self {
            v: EVENT_VERSION,
            kind,
            request_id: None,
            payload,
            error: None,
        }
    }

    /// Successful response to request `request_id`.
    #[must_use]
    pub fn response(request_id: impl Into<String>, payload: Value) -> Self {
        Self {
            request_id: Some(request_id.into()),
            ..Self::new(InboundKind::Response, payload)
        }
    }

    /// Failed response to request `request_id`.
    #[must_use]
    pub fn response_error(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            request_id: Some(request_id.into()),
            error: Some(message.into()),
            ..Self::new(InboundKind::Response, Value::Null)
        }
    }

    /// Validate envelope version and required identifiers.
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.v != EVENT_VERSION {
            return Err(ContractError::new(
                ContractErrorKind::UnsupportedVersion,
                format!(
                    "unsupported contract version {}; expected {}",
                    self.v, EVENT_VERSION
                ),
            ));
        }
        if self.kind == InboundKind::Response
            && self
                .request_id
                .as_deref()
                .is_none_or(|id| id.trim().is_empty())
        {
            return Err(ContractError::new(
                ContractErrorKind::InvalidEnvelope,
                "response requires a request_id".to_owned(),
            ));
        }
        Ok(())
    }
}

/// A versioned envelope from bridge -> host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEnvelope {
    pub v: u32,
    pub kind: OutboundKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub payload: Value,
}

impl OutboundEnvelope {
    /// A request the host must answer.
    #[must_use]
    pub fn request(request_id: impl Into<String>, kind: OutboundKind, payload: Value) -> Self {
        Self {
            v: EVENT_VERSION,
            kind,
            request_id: Some(request_id.into()),
            payload,
        }
    }

    /// A fire-and-forget notification or event.
    #[must_use]
    pub fn event(kind: OutboundKind, payload: Value) -> Self {
        Self {
            v: EVENT_VERSION,
            kind,
            request_id: None,
            payload,
        }
    }
}

/// Presentation mode of the diagram.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Inline,
    Fullscreen,
}

impl DisplayMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Fullscreen => "fullscreen",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "inline" => Some(Self::Inline),
            "fullscreen" => Some(Self::Fullscreen),
            _ => None,
        }
    }
}

/// Severity of a host log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Container dimensions reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContainerDimensions {
    pub width: f64,
    pub height: f64,
}

/// Payload of `host_context_changed`. Every field is optional; absent
/// fields mean "unchanged".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_mode: Option<DisplayMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_dimensions: Option<ContainerDimensions>,
}

/// Checkpoint id carried by a `tool_result`, either at the top level or
/// under `structuredContent`.
#[must_use]
pub fn checkpoint_id_of(result: &Value) -> Option<String> {
    result
        .get("checkpointId")
        .or_else(|| result.pointer("/structuredContent/checkpointId"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
}

/// User gestures a host UI can forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UserAction {
    ToggleFullscreen,
    Escape,
    ZoomIn,
    ZoomOut,
    ResetZoom,
    Pan { dx: f64, dy: f64 },
    OpenLink { url: String },
}

/// Payload of `render.frame`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FramePayload {
    pub frame: u64,
    pub element_count: usize,
    pub svg: String,
}

/// Payload of `render.viewport`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportPayload {
    pub view_box: ViewportRect,
}

/// Contract validation error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractErrorKind {
    UnsupportedVersion,
    InvalidEnvelope,
}

/// Contract validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractError {
    pub kind: ContractErrorKind,
    pub message: String,
}

impl ContractError {
    #[must_use]
    pub fn new(kind: ContractErrorKind, message: String) -> Self {
        Self { kind, message }
    }
}

impl std::fmt::Display for ContractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ContractError {}
