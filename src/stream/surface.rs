//! Persistent rendered surface, patched in place frame to frame.
//!
//! Each exported frame is a keyed node list. Instead of replacing the
//! surface, [`RenderedSurface::patch`] diffs the key sequence against the
//! previous frame and touches only what changed, so a node that survives
//! keeps the frame it was born in (and with it any running animation).

use std::collections::HashMap;

use similar::{Algorithm, DiffOp, capture_diff_slices};

use crate::editor::{RenderedImage, SvgNode};

/// One node on the live surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceNode {
    pub key: String,
    pub markup: String,
    /// Frame in which the node first appeared.
    pub born_frame: u64,
    /// Frame in which the markup last changed.
    pub updated_frame: u64,
}

/// What one patch did to the surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchStats {
    pub kept: usize,
    pub updated: usize,
    pub moved: usize,
    pub inserted: usize,
    pub removed: usize,
}

impl PatchStats {
    pub fn is_noop(&self) -> bool {
        self.updated == 0 && self.moved == 0 && self.inserted == 0 && self.removed == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenderedSurface {
    width: f64,
    height: f64,
    background: String,
    nodes: Vec<SurfaceNode>,
    frame: u64,
}

impl RenderedSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[SurfaceNode] {
        &self.nodes
    }

    /// Number of frames applied so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Apply `image` as the next frame.
    pub fn patch(&mut self, image: RenderedImage) -> PatchStats {
        self.frame += 1;
        let frame = self.frame;
        self.width = image.width;
        self.height = image.height;
        self.background = image.background;

        let old_keys: Vec<&str> = self.nodes.iter().map(|n| n.key.as_str()).collect();
        let new_keys: Vec<&str> = image.nodes.iter().map(|n| n.key.as_str()).collect();
        let ops = capture_diff_slices(Algorithm::Myers, &old_keys, &new_keys);

        let mut old: Vec<Option<SurfaceNode>> = std::mem::take(&mut self.nodes)
            .into_iter()
            .map(Some)
            .collect();

        // Nodes dropped from their position may reappear elsewhere.
        let mut detached: HashMap<String, SurfaceNode> = HashMap::new();
        for op in &ops {
            let range = match *op {
                DiffOp::Delete {
                    old_index, old_len, ..
                }
                | DiffOp::Replace {
                    old_index, old_len, ..
                } => old_index..old_index + old_len,
                _ => continue,
            };
            for slot in &mut old[range] {
                if let Some(node) = slot.take() {
                    detached.entry(node.key.clone()).or_insert(node);
                }
            }
        }

        let mut stats = PatchStats::default();
        let mut new_nodes = image.nodes.into_iter().map(Some).collect::<Vec<_>>();
        let mut next: Vec<SurfaceNode> = Vec::with_capacity(new_nodes.len());

        for op in &ops {
            match *op {
                DiffOp::Equal {
                    old_index,
                    new_index,
                    len,
                } => {
                    for i in 0..len {
                        let (Some(mut node), Some(incoming)) =
                            (old[old_index + i].take(), new_nodes[new_index + i].take())
                        else {
                            continue;
                        };
                        if node.markup == incoming.markup {
                            stats.kept += 1;
                        } else {
                            node.markup = incoming.markup;
                            node.updated_frame = frame;
                            stats.updated += 1;
                        }
                        next.push(node);
                    }
                }
                DiffOp::Insert {
                    new_index, new_len, ..
                }
                | DiffOp::Replace {
                    new_index, new_len, ..
                } => {
                    for slot in &mut new_nodes[new_index..new_index + new_len] {
                        let Some(incoming) = slot.take() else {
                            continue;
                        };
                        next.push(revive_or_insert(incoming, &mut detached, frame, &mut stats));
                    }
                }
                DiffOp::Delete { .. } => {}
            }
        }

        stats.removed = detached.len();
        self.nodes = next;
        stats
    }

    /// Serialize the live surface as an SVG document.
    pub fn to_svg(&self) -> String {
        RenderedImage {
            width: self.width,
            height: self.height,
            background: self.background.clone(),
            nodes: self
                .nodes
                .iter()
                .map(|n| SvgNode {
                    key: n.key.clone(),
                    markup: n.markup.clone(),
                })
                .collect(),
        }
        .to_svg()
    }
}

fn revive_or_insert(
    incoming: SvgNode,
    detached: &mut HashMap<String, SurfaceNode>,
    frame: u64,
    stats: &mut PatchStats,
) -> SurfaceNode {
    match detached.remove(&incoming.key) {
        Some(mut node) => {
            stats.moved += 1;
            if node.markup != incoming.markup {
                node.markup = incoming.markup;
                node.updated_frame = frame;
            }
            node
        }
        None => {
            stats.inserted += 1;
            SurfaceNode {
                key: incoming.key,
                markup: incoming.markup,
                born_frame: frame,
                updated_frame: frame,
            }
        }
    }
}
