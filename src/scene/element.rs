//! Drawable element model shared by raw (shorthand) and native scenes.
//!
//! Tool input uses a compact shorthand schema; the editor library works on
//! its own native schema. Both are carried by [`Element`]: the fields the
//! pipeline reasons about are typed, everything else rides along in
//! [`Element::extra`] so native records survive a round trip untouched.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opacity assigned to logically deleted elements.
///
/// Near-invisible but not zero so the element keeps its slot in the scene.
pub const TOMBSTONE_OPACITY: f64 = 1.0;

/// Opacity of a fully visible native element (editor scale is 0..=100).
pub const FULL_OPACITY: f64 = 100.0;

/// Text label attached to a container shape in shorthand form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One visual primitive: shape, text, arrow, or freehand stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    #[serde(default)]
    pub id: String,
    /// Shape tag. Objects without one still draw, as an unknown kind.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// Offset points relative to `(x, y)` for multi-point shapes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<[f64; 2]>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<Label>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    /// Hand-drawn jitter seed. Present on every native element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Element {
    /// Create a bare element of the given type at `(x, y)`.
    pub fn new(id: impl Into<String>, kind: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            x,
            y,
            width: None,
            height: None,
            points: None,
            container_id: None,
            label: None,
            text: None,
            opacity: None,
            seed: None,
            extra: Map::new(),
        }
    }

    /// Builder: set width and height.
    #[must_use]
    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Builder: set offset points.
    #[must_use]
    pub fn with_points(mut self, points: Vec<[f64; 2]>) -> Self {
        self.points = Some(points);
        self
    }

    /// Whether the element is already in the editor's native schema.
    ///
    /// Conversion always assigns a seed, shorthand never carries one.
    pub fn is_native(&self) -> bool {
        self.seed.is_some()
    }

    /// Whether this element is targeted by any id in `ids`, either directly
    /// or through its container.
    pub fn is_targeted_by(&self, ids: &HashSet<String>) -> bool {
        ids.contains(&self.id)
            || self
                .container_id
                .as_ref()
                .is_some_and(|container| ids.contains(container))
    }

    /// Mark the element as logically deleted without removing it.
    pub fn tombstone(&mut self) {
        self.opacity = Some(TOMBSTONE_OPACITY);
    }

    pub fn is_tombstoned(&self) -> bool {
        self.opacity
            .is_some_and(|o| (o - TOMBSTONE_OPACITY).abs() < f64::EPSILON)
    }
}

/// Elements still in shorthand form. Must be converted before composition
/// or export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawElements(pub Vec<Element>);

impl RawElements {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Element] {
        &self.0
    }

    /// Give every element without an id one that is free in both `reserved`
    /// and this list.
    ///
    /// Generated ids are `{kind}-{index}`, suffixed with a counter while
    /// taken. Re-running over a list that only grew at the end yields the
    /// same ids, so streamed elements keep their identity across chunks.
    pub fn assign_missing_ids(&mut self, reserved: &HashSet<String>) {
        let mut taken: HashSet<String> = reserved.clone();
        taken.extend(
            self.0
                .iter()
                .filter(|el| !el.id.is_empty())
                .map(|el| el.id.clone()),
        );

        for (index, el) in self.0.iter_mut().enumerate() {
            if !el.id.is_empty() {
                continue;
            }
            let kind = if el.kind.is_empty() { "element" } else { el.kind.as_str() };
            let stem = format!("{kind}-{index}");
            let mut candidate = stem.clone();
            let mut n = 1;
            while taken.contains(&candidate) {
                candidate = format!("{stem}-{n}");
                n += 1;
            }
            taken.insert(candidate.clone());
            el.id = candidate;
        }
    }
}

/// An ordered, native, library-ready scene.
pub type Scene = Vec<Element>;
