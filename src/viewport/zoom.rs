//! User zoom and pan, composed on top of the scene-driven camera.

use crate::scene::ViewportRect;

/// Scale and pan chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserZoom {
    pub scale: f64,
    pub pan_x: f64,
    pub pan_y: f64,
}

impl Default for UserZoom {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl UserZoom {
    pub const IDENTITY: Self = Self {
        scale: 1.0,
        pan_x: 0.0,
        pan_y: 0.0,
    };

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Multiply the scale by `factor`, clamped to `[min, max]`.
    pub fn zoom_by(&mut self, factor: f64, min: f64, max: f64) {
        if factor.is_finite() && factor > 0.0 {
            self.scale = (self.scale * factor).clamp(min, max);
        }
    }

    /// Shift the view by `(dx, dy)` render units.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.pan_x += dx;
        self.pan_y += dy;
    }

    pub fn reset(&mut self) {
        *self = Self::IDENTITY;
    }

    /// Apply to a render-space view box: scale about its center, then pan.
    pub fn apply(&self, view: ViewportRect) -> ViewportRect {
        let width = view.width / self.scale;
        let height = view.height / self.scale;
        ViewportRect {
            x: view.x + (view.width - width) / 2.0 + self.pan_x,
            y: view.y + (view.height - height) / 2.0 + self.pan_y,
            width,
            height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_leaves_view_unchanged() {
        let view = ViewportRect::new(12.0, -4.0, 800.0, 600.0);
        assert_eq!(UserZoom::IDENTITY.apply(view), view);
    }

    #[test]
    fn zoom_in_shrinks_view_about_center() {
        let mut z = UserZoom::default();
        z.zoom_by(2.0, 0.1, 10.0);
        let out = z.apply(ViewportRect::new(0.0, 0.0, 800.0, 600.0));
        assert_eq!(out, ViewportRect::new(200.0, 150.0, 400.0, 300.0));
    }

    #[test]
    fn zoom_is_clamped() {
        let mut z = UserZoom::default();
        z.zoom_by(100.0, 0.1, 10.0);
        assert!((z.scale - 10.0).abs() < f64::EPSILON);
        z.zoom_by(0.0, 0.1, 10.0);
        assert!((z.scale - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn pan_then_reset() {
        let mut z = UserZoom::default();
        z.pan_by(5.0, -3.0);
        let out = z.apply(ViewportRect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!((out.x, out.y), (5.0, -3.0));
        z.reset();
        assert!(z.is_identity());
    }
}
