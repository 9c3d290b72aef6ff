//! Text metrics and the reference dimension restorer.

use super::backend::DimensionRestorer;
use crate::scene::{Element, Scene};

/// Average glyph advance as a fraction of the font size.
const CHAR_WIDTH_RATIO: f64 = 0.6;

/// Line height as a multiple of the font size.
const LINE_HEIGHT_RATIO: f64 = 1.25;

/// Font size used when a text element carries none.
pub const DEFAULT_FONT_SIZE: f64 = 20.0;

/// Measure `text` at `font_size` with a fixed-advance metric.
pub fn measure_text(text: &str, font_size: f64) -> (f64, f64) {
    let lines: Vec<&str> = text.split('\n').collect();
    let longest = lines
        .iter()
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0);
    let width = longest as f64 * font_size * CHAR_WIDTH_RATIO;
    let height = lines.len() as f64 * font_size * LINE_HEIGHT_RATIO;
    (width, height)
}

/// Font size of a native text element.
pub fn font_size_of(el: &Element) -> f64 {
    el.extra
        .get("fontSize")
        .and_then(serde_json::Value::as_f64)
        .unwrap_or(DEFAULT_FONT_SIZE)
}

/// Recomputes text element width/height with [`measure_text`].
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricRestorer;

impl DimensionRestorer for MetricRestorer {
    fn refresh(&self, scene: &[Element]) -> Scene {
        scene
            .iter()
            .map(|el| {
                let mut el = el.clone();
                if el.kind == "text" {
                    let text = el.text.clone().unwrap_or_default();
                    let (w, h) = measure_text(&text, font_size_of(&el));
                    el.width = Some(w);
                    el.height = Some(h);
                }
                el
            })
            .collect()
    }
}
