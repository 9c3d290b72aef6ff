//! Animated camera: interpolation, user zoom, and the frame-clock driver.

pub mod animator;
pub mod driver;
pub mod zoom;

pub use animator::{AnimatorPhase, ViewportAnimator};
pub use driver::CameraDriver;
pub use zoom::UserZoom;
