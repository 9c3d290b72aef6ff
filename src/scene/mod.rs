//! Scene model and the pure stages of the streaming pipeline.
//!
//! Streamed tool input flows through [`partial`] recovery, then
//! [`classify`], then [`bounds`] when a frame is placed.

pub mod bounds;
pub mod classify;
pub mod element;
pub mod partial;

pub use bounds::{SceneOrigin, ViewportRect, compute_bounds, map_to_render_space, normalize_aspect};
pub use classify::{Classified, SceneEntry, classify};
pub use element::{Element, Label, RawElements, Scene};
pub use partial::{recover_elements, recover_settled_elements};
