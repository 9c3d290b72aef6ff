//! Streaming render loop and the persistent surface it draws on.

pub mod renderer;
pub mod surface;

pub use renderer::{CycleOutcome, RenderCapabilities, StreamRenderer, tool_elements};
pub use surface::{PatchStats, RenderedSurface, SurfaceNode};
