//! Reference shorthand-to-native converter.
//!
//! Mirrors what the editor library's own conversion does for the fields the
//! pipeline relies on: every element ends up with an id, a seed, and an
//! opacity; text gets the configured font; container labels become bound
//! text elements that point back at their container.

use std::collections::HashSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde_json::{Value, json};

use super::backend::SceneConverter;
use super::metrics::measure_text;
use crate::config::RenderConfig;
use crate::error::Result;
use crate::scene::element::FULL_OPACITY;
use crate::scene::{Element, RawElements, Scene};

const LINEAR_KINDS: [&str; 3] = ["line", "arrow", "freedraw"];

/// Converts tool shorthand into native editor elements.
#[derive(Debug, Clone)]
pub struct ShorthandConverter {
    font_family: u32,
    font_size: f64,
}

impl ShorthandConverter {
    pub fn new(font_family: u32, font_size: f64) -> Self {
        Self {
            font_family,
            font_size,
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(config.font_family, config.font_size)
    }

    fn apply_font(&self, el: &mut Element, font_size: f64) {
        el.extra
            .insert("fontFamily".into(), Value::from(self.font_family));
        el.extra.insert("fontSize".into(), Value::from(font_size));
        let text = el.text.clone().unwrap_or_default();
        let (w, h) = measure_text(&text, font_size);
        el.width = Some(w);
        el.height = Some(h);
    }

    fn convert_one(&self, mut el: Element, out: &mut Scene) {
        el.seed.get_or_insert_with(|| seed_for(&el.id));
        el.opacity.get_or_insert(FULL_OPACITY);

        if LINEAR_KINDS.contains(&el.kind.as_str()) && el.points.is_none() {
            let w = el.width.unwrap_or(0.0);
            let h = el.height.unwrap_or(0.0);
            el.points = Some(vec![[0.0, 0.0], [w, h]]);
        }

        if el.kind == "text" {
            let size = existing_font_size(&el).unwrap_or(self.font_size);
            self.apply_font(&mut el, size);
        }

        let label = el.label.take();
        let bound_text = label.filter(|l| !l.text.is_empty()).map(|label| {
            let mut text = Element::new(format!("{}-label", el.id), "text", el.x, el.y);
            text.text = Some(label.text.clone());
            text.container_id = Some(el.id.clone());
            text.opacity = el.opacity;
            text.seed = Some(seed_for(&text.id));
            self.apply_font(&mut text, label.font_size.unwrap_or(self.font_size));
            // Center inside the container.
            let (tw, th) = (text.width.unwrap_or(0.0), text.height.unwrap_or(0.0));
            text.x = el.x + (el.width.unwrap_or(tw) - tw) / 2.0;
            text.y = el.y + (el.height.unwrap_or(th) - th) / 2.0;
            text
        });

        if let Some(text) = &bound_text {
            el.extra.insert(
                "boundElements".into(),
                json!([{ "id": text.id, "type": "text" }]),
            );
        }

        out.push(el);
        out.extend(bound_text);
    }
}

impl Default for ShorthandConverter {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

impl SceneConverter for ShorthandConverter {
    fn to_native(&self, raw: &RawElements) -> Result<Scene> {
        let mut named = raw.clone();
        named.assign_missing_ids(&HashSet::new());

        let mut out = Vec::with_capacity(named.len());
        for el in named.0 {
            if el.is_native() {
                out.push(el);
            } else {
                self.convert_one(el, &mut out);
            }
        }
        Ok(out)
    }
}

fn existing_font_size(el: &Element) -> Option<f64> {
    el.extra.get("fontSize").and_then(Value::as_f64)
}

/// Deterministic seed derived from an element id.
fn seed_for(id: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    // Editor seeds are positive 31-bit integers.
    (hasher.finish() % 2_147_483_646) + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Label;

    fn convert(raw: Vec<Element>) -> Scene {
        ShorthandConverter::default()
            .to_native(&RawElements(raw))
            .expect("convert in test")
    }

    #[test]
    fn preserves_ids_and_assigns_seed_and_opacity() {
        let out = convert(vec![Element::new("r1", "rectangle", 0.0, 0.0)]);
        assert_eq!(out[0].id, "r1");
        assert!(out[0].is_native());
        assert_eq!(out[0].opacity, Some(FULL_OPACITY));
    }

    #[test]
    fn is_deterministic() {
        let raw = vec![
            Element::new("", "ellipse", 3.0, 4.0),
            Element::new("b", "rectangle", 0.0, 0.0),
        ];
        assert_eq!(convert(raw.clone()), convert(raw));
    }

    #[test]
    fn generated_ids_never_shadow_explicit_ones() {
        let out = convert(vec![
            Element::new("", "rectangle", 0.0, 0.0),
            Element::new("rectangle-0", "rectangle", 50.0, 0.0),
        ]);
        assert_ne!(out[0].id, out[1].id);
        assert_eq!(out[1].id, "rectangle-0");
    }

    #[test]
    fn tombstone_opacity_survives_conversion() {
        let mut el = Element::new("gone", "rectangle", 0.0, 0.0);
        el.tombstone();
        let out = convert(vec![el]);
        assert!(out[0].is_tombstoned());
    }

    #[test]
    fn label_becomes_bound_text() {
        let mut rect = Element::new("box", "rectangle", 100.0, 100.0).with_size(200.0, 80.0);
        rect.label = Some(Label {
            text: "Start".into(),
            font_size: Some(16.0),
            extra: Default::default(),
        });
        let out = convert(vec![rect]);
        assert_eq!(out.len(), 2);
        let text = &out[1];
        assert_eq!(text.kind, "text");
        assert_eq!(text.container_id.as_deref(), Some("box"));
        assert_eq!(text.text.as_deref(), Some("Start"));
        assert_eq!(text.extra.get("fontFamily"), Some(&Value::from(5u32)));
        assert!(out[0].label.is_none());
        assert_eq!(out[0].extra["boundElements"][0]["id"], "box-label");
        // Centered horizontally: 5 chars * 16 * 0.6 = 48 wide.
        assert!((text.x - (100.0 + (200.0 - 48.0) / 2.0)).abs() < 1e-9);
    }

    #[test]
    fn arrow_without_points_gets_endpoints() {
        let out = convert(vec![Element::new("a", "arrow", 0.0, 0.0).with_size(50.0, 10.0)]);
        assert_eq!(out[0].points, Some(vec![[0.0, 0.0], [50.0, 10.0]]));
    }

    #[test]
    fn native_input_passes_through() {
        let mut el = Element::new("n", "rectangle", 0.0, 0.0);
        el.seed = Some(7);
        let out = convert(vec![el.clone()]);
        assert_eq!(out, vec![el]);
    }
}
