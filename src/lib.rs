//! Inkstream: streaming diagram front-end core.
//!
//! Renders a diagram progressively while a tool call is still streaming
//! its arguments, then hands the finished scene to a full editor.
//!
//! # Architecture
//!
//! Each inbound host event flows through a single-writer session:
//! - **Partial recovery**: salvages complete elements from truncated JSON
//! - **Classification**: splits drawables from camera, restore and delete directives
//! - **Reconciliation**: merges restored checkpoints with the new elements
//! - **Rendering**: exports each scene and patches the retained surface
//! - **Viewport**: animates the camera toward the latest target on a frame clock
//! - **Lifecycle**: moves between the inline preview and the fullscreen editor
//!
//! The host bridge speaks line-delimited JSON over stdin and stdout.

pub mod checkpoint;
pub mod config;
pub mod editor;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod scene;
pub mod session;
pub mod stream;
pub mod viewport;

#[doc(hidden)]
pub mod test_utils;

pub use config::InkConfig;
pub use error::{Result, StreamError};
pub use session::{DiagramSession, SessionParts};
