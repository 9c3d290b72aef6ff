//! Reference SVG exporter.
//!
//! Produces one keyed node per native element so the rendered surface can be
//! patched in place. The scene's top-left bounding corner lands at
//! `(padding, padding)`, which is the convention the viewport mapper relies on.

use async_trait::async_trait;

use super::backend::{ExportOptions, SceneExporter};
use crate::error::{Result, StreamError};
use crate::scene::element::FULL_OPACITY;
use crate::scene::{Element, compute_bounds};

const DEFAULT_STROKE: &str = "#1e1e1e";
const DEFAULT_FILL: &str = "transparent";

/// One rendered element, keyed by element id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SvgNode {
    pub key: String,
    pub markup: String,
}

/// A rendered frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedImage {
    pub width: f64,
    pub height: f64,
    pub background: String,
    pub nodes: Vec<SvgNode>,
}

impl RenderedImage {
    /// Serialize as a standalone SVG document.
    pub fn to_svg(&self) -> String {
        let mut svg = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 {w} {h}\" width=\"{w}\" height=\"{h}\">",
            w = fmt_num(self.width),
            h = fmt_num(self.height),
        );
        svg.push_str(&format!(
            "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
            escape(&self.background)
        ));
        for node in &self.nodes {
            svg.push_str(&node.markup);
        }
        svg.push_str("</svg>");
        svg
    }
}

/// Exports native elements to SVG nodes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SvgExporter;

impl SvgExporter {
    fn validate(el: &Element) -> Result<()> {
        if !el.x.is_finite() || !el.y.is_finite() {
            return Err(StreamError::Export(format!(
                "element {} has non-finite position",
                el.id
            )));
        }
        if matches!(el.kind.as_str(), "line" | "arrow" | "freedraw") {
            let count = el.points.as_ref().map_or(0, Vec::len);
            if count < 2 {
                return Err(StreamError::Export(format!(
                    "{} {} needs at least two points, has {count}",
                    el.kind, el.id
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SceneExporter for SvgExporter {
    async fn export(&self, scene: &[Element], options: &ExportOptions) -> Result<RenderedImage> {
        for el in scene {
            Self::validate(el)?;
        }

        let origin = compute_bounds(scene);
        let mut max_x = origin.min_x;
        let mut max_y = origin.min_y;
        for el in scene {
            max_x = max_x.max(el.x + el.width.unwrap_or(0.0));
            max_y = max_y.max(el.y + el.height.unwrap_or(0.0));
            for [px, py] in el.points.iter().flatten() {
                max_x = max_x.max(el.x + px);
                max_y = max_y.max(el.y + py);
            }
        }

        let pad = options.padding;
        let nodes = scene
            .iter()
            .map(|el| SvgNode {
                key: el.id.clone(),
                markup: render_node(el, el.x - origin.min_x + pad, el.y - origin.min_y + pad),
            })
            .collect();

        Ok(RenderedImage {
            width: max_x - origin.min_x + 2.0 * pad,
            height: max_y - origin.min_y + 2.0 * pad,
            background: options.background.clone(),
            nodes,
        })
    }
}

fn render_node(el: &Element, tx: f64, ty: f64) -> String {
    let stroke = style(el, "strokeColor", DEFAULT_STROKE);
    let fill = style(el, "backgroundColor", DEFAULT_FILL);
    let opacity = el.opacity.unwrap_or(FULL_OPACITY) / 100.0;
    let w = el.width.unwrap_or(0.0);
    let h = el.height.unwrap_or(0.0);

    let body = match el.kind.as_str() {
        "rectangle" => format!(
            "<rect width=\"{}\" height=\"{}\" stroke=\"{stroke}\" fill=\"{fill}\"/>",
            fmt_num(w),
            fmt_num(h)
        ),
        "ellipse" => format!(
            "<ellipse cx=\"{}\" cy=\"{}\" rx=\"{}\" ry=\"{}\" stroke=\"{stroke}\" fill=\"{fill}\"/>",
            fmt_num(w / 2.0),
            fmt_num(h / 2.0),
            fmt_num(w / 2.0),
            fmt_num(h / 2.0)
        ),
        "diamond" => format!(
            "<polygon points=\"{},0 {},{} {},{} 0,{}\" stroke=\"{stroke}\" fill=\"{fill}\"/>",
            fmt_num(w / 2.0),
            fmt_num(w),
            fmt_num(h / 2.0),
            fmt_num(w / 2.0),
            fmt_num(h),
            fmt_num(h / 2.0)
        ),
        "line" | "arrow" | "freedraw" => {
            let points: Vec<String> = el
                .points
                .iter()
                .flatten()
                .map(|[px, py]| format!("{},{}", fmt_num(*px), fmt_num(*py)))
                .collect();
            let marker = if el.kind == "arrow" {
                " marker-end=\"url(#arrowhead)\""
            } else {
                ""
            };
            format!(
                "<polyline points=\"{}\" stroke=\"{stroke}\" fill=\"none\"{marker}/>",
                points.join(" ")
            )
        }
        "text" => format!(
            "<text dominant-baseline=\"hanging\" font-size=\"{}\" fill=\"{stroke}\">{}</text>",
            fmt_num(super::metrics::font_size_of(el)),
            escape(el.text.as_deref().unwrap_or_default())
        ),
        _ => String::new(),
    };

    format!(
        "<g data-id=\"{}\" data-seed=\"{}\" transform=\"translate({} {})\" opacity=\"{}\">{body}</g>",
        escape(&el.id),
        el.seed.unwrap_or(0),
        fmt_num(tx),
        fmt_num(ty),
        fmt_num(opacity)
    )
}

fn style(el: &Element, key: &str, fallback: &str) -> String {
    escape(el.extra.get(key).and_then(|v| v.as_str()).unwrap_or(fallback))
}

/// Round to two decimals and drop a trailing `.00`.
fn fmt_num(v: f64) -> String {
    let rounded = (v * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{rounded:.0}")
    } else {
        format!("{rounded}")
    }
}

/// Escape XML special characters.
fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
