//! Scene bounds and viewport-to-render-space mapping.
//!
//! The exporter places the scene's top-left bounding corner at
//! `(padding, padding)` in the rendered image. The mapper applies the same
//! shift, so both must be driven by one padding value.

use serde::{Deserialize, Serialize};

use super::element::Element;

/// Target aspect ratio of the rendered viewport.
pub const VIEWPORT_ASPECT: f64 = 4.0 / 3.0;

/// A rectangle in scene (or render) units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ViewportRect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Canonical view used when no explicit camera instruction exists.
    pub const CANONICAL: Self = Self::new(0.0, 0.0, 1024.0, 768.0);

    /// Sum of absolute per-field differences.
    pub fn distance(&self, other: &Self) -> f64 {
        (self.x - other.x).abs()
            + (self.y - other.y).abs()
            + (self.width - other.width).abs()
            + (self.height - other.height).abs()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }
}

impl Default for ViewportRect {
    fn default() -> Self {
        Self::CANONICAL
    }
}

/// Top-left corner of the scene's bounding box.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SceneOrigin {
    pub min_x: f64,
    pub min_y: f64,
}

/// Minimum over element positions and absolute offset-point positions.
///
/// An empty scene yields `(0, 0)`.
pub fn compute_bounds(elements: &[Element]) -> SceneOrigin {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;

    for el in elements {
        min_x = min_x.min(el.x);
        min_y = min_y.min(el.y);
        for [px, py] in el.points.iter().flatten() {
            min_x = min_x.min(el.x + px);
            min_y = min_y.min(el.y + py);
        }
    }

    if !min_x.is_finite() || !min_y.is_finite() {
        return SceneOrigin::default();
    }
    SceneOrigin { min_x, min_y }
}

/// Map a scene-space viewport into the exported image's coordinate space.
pub fn map_to_render_space(viewport: ViewportRect, origin: SceneOrigin, padding: f64) -> ViewportRect {
    ViewportRect {
        x: viewport.x - origin.min_x + padding,
        y: viewport.y - origin.min_y + padding,
        width: viewport.width,
        height: viewport.height,
    }
}

/// Expand the shorter side so the rectangle is exactly 4:3.
///
/// The longer side is preserved and the expansion is split evenly on both
/// sides of the original rectangle. Ratios within `tolerance` of 4:3 and
/// degenerate rectangles are returned unchanged.
pub fn normalize_aspect(viewport: ViewportRect, tolerance: f64) -> ViewportRect {
    let ViewportRect {
        x,
        y,
        width,
        height,
    } = viewport;

    if width <= 0.0 && height <= 0.0 {
        return viewport;
    }
    if height > 0.0 && ((width / height) - VIEWPORT_ASPECT).abs() <= tolerance {
        return viewport;
    }

    if height <= 0.0 || width / height > VIEWPORT_ASPECT {
        let new_height = width / VIEWPORT_ASPECT;
        ViewportRect {
            x,
            y: y - (new_height - height) / 2.0,
            width,
            height: new_height,
        }
    } else {
        let new_width = height * VIEWPORT_ASPECT;
        ViewportRect {
            x: x - (new_width - width) / 2.0,
            y,
            width: new_width,
            height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 0.01;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn empty_scene_bounds_are_origin() {
        assert_eq!(compute_bounds(&[]), SceneOrigin { min_x: 0.0, min_y: 0.0 });
    }

    #[test]
    fn single_element_bounds_are_its_position() {
        let el = Element::new("a", "rectangle", 5.0, 5.0);
        assert_eq!(compute_bounds(&[el]), SceneOrigin { min_x: 5.0, min_y: 5.0 });
    }

    #[test]
    fn offset_points_extend_bounds() {
        let arrow = Element::new("a", "arrow", 100.0, 50.0)
            .with_points(vec![[0.0, 0.0], [-30.0, 10.0], [20.0, -45.0]]);
        let rect = Element::new("b", "rectangle", 80.0, 60.0);
        let origin = compute_bounds(&[arrow, rect]);
        assert!(approx(origin.min_x, 70.0));
        assert!(approx(origin.min_y, 5.0));
    }

    #[test]
    fn mapping_shifts_by_origin_and_padding() {
        let vp = ViewportRect::new(100.0, -40.0, 800.0, 600.0);
        let origin = SceneOrigin { min_x: 30.0, min_y: -60.0 };
        let mapped = map_to_render_space(vp, origin, 20.0);
        assert!(approx(mapped.x, 100.0 - 30.0 + 20.0));
        assert!(approx(mapped.y, -40.0 + 60.0 + 20.0));
        assert!(approx(mapped.width, 800.0));
        assert!(approx(mapped.height, 600.0));
    }

    #[test]
    fn four_by_three_is_untouched() {
        let vp = ViewportRect::new(10.0, 10.0, 400.0, 300.0);
        assert_eq!(normalize_aspect(vp, TOL), vp);
    }

    #[test]
    fn wide_viewport_grows_height() {
        let vp = ViewportRect::new(0.0, 0.0, 800.0, 300.0);
        let out = normalize_aspect(vp, TOL);
        assert!(approx(out.width, 800.0));
        assert!(approx(out.height, 600.0));
        assert!(approx(out.y, -150.0));
        assert!(approx(out.x, 0.0));
    }

    #[test]
    fn tall_viewport_grows_width() {
        let vp = ViewportRect::new(0.0, 0.0, 300.0, 600.0);
        let out = normalize_aspect(vp, TOL);
        assert!(approx(out.height, 600.0));
        assert!(approx(out.width, 800.0));
        assert!(approx(out.x, -250.0));
        assert!(approx(out.width / out.height, VIEWPORT_ASPECT));
    }

    #[test]
    fn zero_height_derives_height_from_width() {
        let out = normalize_aspect(ViewportRect::new(0.0, 0.0, 400.0, 0.0), TOL);
        assert!(approx(out.height, 300.0));
    }

    #[test]
    fn distance_sums_all_fields() {
        let a = ViewportRect::new(0.0, 0.0, 100.0, 100.0);
        let b = ViewportRect::new(100.0, 100.0, 200.0, 200.0);
        assert!(approx(a.distance(&b), 400.0));
    }
}
