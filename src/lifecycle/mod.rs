//! Display-mode lifecycle of the diagram view.

pub mod controller;

pub use controller::{EditorState, ModeController, Transition, Trigger};
