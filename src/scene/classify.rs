//! Split a flat element sequence into control directives and drawables.
//!
//! Three reserved `type` tags are directives, everything else draws:
//!
//! | tag                 | entry                           |
//! |---------------------|---------------------------------|
//! | `cameraUpdate`      | [`SceneEntry::ViewportUpdate`]  |
//! | `restoreCheckpoint` | [`SceneEntry::RestoreCheckpoint`] |
//! | `delete`            | [`SceneEntry::Delete`]          |
//!
//! An object with no `type` is a drawable of unknown kind. Only entries that
//! are not objects, or directives missing a required field (a `cameraUpdate`
//! without a size, a `restoreCheckpoint` without an id), are left out of the
//! partition.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;

use super::bounds::ViewportRect;
use super::element::{Element, RawElements};
use crate::error::{Result, StreamError};

pub const CAMERA_UPDATE_TAG: &str = "cameraUpdate";
pub const RESTORE_CHECKPOINT_TAG: &str = "restoreCheckpoint";
pub const DELETE_TAG: &str = "delete";

/// One classified entry of the tool's element stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEntry {
    Drawable(Element),
    ViewportUpdate(ViewportRect),
    RestoreCheckpoint { id: String },
    Delete { ids: Vec<String> },
}

#[derive(Deserialize)]
struct CameraFields {
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
    width: f64,
    height: f64,
}

#[derive(Deserialize)]
struct RestoreFields {
    id: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdList {
    Joined(String),
    List(Vec<String>),
}

#[derive(Deserialize)]
struct DeleteFields {
    #[serde(default)]
    ids: Option<IdList>,
    #[serde(default)]
    id: Option<String>,
}

impl SceneEntry {
    /// Classify one JSON object by its `type` tag.
    pub fn from_value(value: Value) -> Result<Self> {
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        match tag.as_str() {
            CAMERA_UPDATE_TAG => {
                let f: CameraFields = serde_json::from_value(value)
                    .map_err(|e| StreamError::Classify(format!("invalid cameraUpdate: {e}")))?;
                Ok(Self::ViewportUpdate(ViewportRect::new(f.x, f.y, f.width, f.height)))
            }
            RESTORE_CHECKPOINT_TAG => {
                let f: RestoreFields = serde_json::from_value(value).map_err(|e| {
                    StreamError::Classify(format!("invalid restoreCheckpoint: {e}"))
                })?;
                Ok(Self::RestoreCheckpoint { id: f.id })
            }
            DELETE_TAG => {
                let f: DeleteFields = serde_json::from_value(value)
                    .map_err(|e| StreamError::Classify(format!("invalid delete: {e}")))?;
                let raw: Vec<String> = match (f.ids, f.id) {
                    (Some(IdList::Joined(joined)), _) => {
                        joined.split(',').map(str::to_owned).collect()
                    }
                    (Some(IdList::List(list)), _) => list,
                    (None, Some(id)) => id.split(',').map(str::to_owned).collect(),
                    (None, None) => Vec::new(),
                };
                let ids = raw
                    .iter()
                    .map(|id| id.trim())
                    .filter(|id| !id.is_empty())
                    .map(str::to_owned)
                    .collect();
                Ok(Self::Delete { ids })
            }
            _ => serde_json::from_value(value)
                .map(Self::Drawable)
                .map_err(|e| StreamError::Classify(format!("invalid {tag} element: {e}"))),
        }
    }
}

/// Result of one classification pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classified {
    /// Last camera instruction in the pass, if any.
    pub viewport: Option<ViewportRect>,
    /// Drawables in original order, with deleted ones tombstoned.
    pub draw_elements: RawElements,
    /// Last checkpoint reference in the pass, if any.
    pub restore_id: Option<String>,
    /// Union of every delete directive in the pass.
    pub delete_ids: HashSet<String>,
}

impl Classified {
    pub fn has_directives(&self) -> bool {
        self.viewport.is_some() || self.restore_id.is_some() || !self.delete_ids.is_empty()
    }
}

/// Partition `values` into directives and drawables.
///
/// Viewport and restore directives are last-write-wins; deletions
/// accumulate. Drawables targeted by a deletion (by id or container) are
/// kept in place as tombstones. Entries that decode as neither a directive
/// nor a drawable are skipped.
pub fn classify(values: Vec<Value>) -> Classified {
    let mut out = Classified::default();
    let mut drawables = Vec::new();

    for value in values {
        match SceneEntry::from_value(value) {
            Ok(SceneEntry::Drawable(el)) => drawables.push(el),
            Ok(SceneEntry::ViewportUpdate(rect)) => out.viewport = Some(rect),
            Ok(SceneEntry::RestoreCheckpoint { id }) => out.restore_id = Some(id),
            Ok(SceneEntry::Delete { ids }) => out.delete_ids.extend(ids),
            Err(e) => tracing::debug!(error = %e, "skipping undecodable element"),
        }
    }

    if !out.delete_ids.is_empty() {
        for el in drawables.iter_mut().filter(|el| el.is_targeted_by(&out.delete_ids)) {
            el.tombstone();
        }
    }

    out.draw_elements = RawElements(drawables);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn drawables_keep_original_order() {
        let c = classify(vec![
            json!({"type":"rectangle","id":"a"}),
            json!({"type":"cameraUpdate","width":800,"height":600}),
            json!({"type":"ellipse","id":"b"}),
            json!({"type":"arrow","id":"c"}),
        ]);
        let ids: Vec<&str> = c.draw_elements.as_slice().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(c.viewport, Some(ViewportRect::new(0.0, 0.0, 800.0, 600.0)));
    }

    #[test]
    fn viewport_and_restore_are_last_write_wins() {
        let c = classify(vec![
            json!({"type":"cameraUpdate","x":0,"y":0,"width":400,"height":300}),
            json!({"type":"restoreCheckpoint","id":"cp1"}),
            json!({"type":"cameraUpdate","x":50,"y":60,"width":800,"height":600}),
            json!({"type":"restoreCheckpoint","id":"cp2"}),
        ]);
        assert_eq!(c.viewport, Some(ViewportRect::new(50.0, 60.0, 800.0, 600.0)));
        assert_eq!(c.restore_id.as_deref(), Some("cp2"));
        assert!(c.draw_elements.is_empty());
    }

    #[test]
    fn deletions_accumulate_across_forms() {
        let c = classify(vec![
            json!({"type":"delete","ids":"a, b"}),
            json!({"type":"delete","ids":["c"]}),
            json!({"type":"delete","id":"d"}),
        ]);
        let mut ids: Vec<_> = c.delete_ids.into_iter().collect();
        ids.sort();
        assert_eq!(ids, ["a", "b", "c", "d"]);
    }

    #[test]
    fn deleted_drawables_become_tombstones() {
        let c = classify(vec![
            json!({"type":"rectangle","id":"box"}),
            json!({"type":"text","id":"t","containerId":"box"}),
            json!({"type":"ellipse","id":"keep"}),
            json!({"type":"delete","ids":"box"}),
        ]);
        let els = c.draw_elements.as_slice();
        assert_eq!(els.len(), 3);
        assert!(els[0].is_tombstoned());
        assert!(els[1].is_tombstoned());
        assert!(!els[2].is_tombstoned());
    }

    #[test]
    fn partition_is_exhaustive_and_disjoint() {
        let input = vec![
            json!({"type":"rectangle","id":"a"}),
            json!({"type":"cameraUpdate","width":1,"height":1}),
            json!({"type":"restoreCheckpoint","id":"cp"}),
            json!({"type":"delete","ids":"zz"}),
            json!({"type":"freedraw","id":"b"}),
        ];
        let c = classify(input);
        let directive_count = usize::from(c.viewport.is_some())
            + usize::from(c.restore_id.is_some())
            + usize::from(!c.delete_ids.is_empty());
        assert_eq!(c.draw_elements.len() + directive_count, 5);
        assert!(c.has_directives());
    }

    #[test]
    fn malformed_directive_is_skipped() {
        let c = classify(vec![
            json!({"type":"cameraUpdate","x":0}),
            json!({"type":"rectangle","id":"a"}),
        ]);
        assert!(c.viewport.is_none());
        assert_eq!(c.draw_elements.len(), 1);
    }

    #[test]
    fn untyped_object_is_a_drawable() {
        let c = classify(vec![
            json!({"id":"loose","x":5,"y":5}),
            json!({"type":"cameraUpdate","width":10,"height":10}),
        ]);
        assert_eq!(c.draw_elements.len(), 1);
        assert_eq!(c.draw_elements.as_slice()[0].id, "loose");
        assert!(c.viewport.is_some());
    }

    #[test]
    fn non_objects_are_skipped() {
        let c = classify(vec![json!(5), json!("rect"), json!({"type":"ellipse","id":"e"})]);
        assert_eq!(c.draw_elements.len(), 1);
    }

    #[test]
    fn entry_dispatch_matches_tag() {
        let entry = SceneEntry::from_value(json!({"type":"restoreCheckpoint","id":"x"}))
            .expect("classify in test");
        assert_eq!(entry, SceneEntry::RestoreCheckpoint { id: "x".into() });
        let entry =
            SceneEntry::from_value(json!({"type":"diamond","id":"d"})).expect("classify in test");
        assert!(matches!(entry, SceneEntry::Drawable(el) if el.kind == "diamond"));
    }
}
