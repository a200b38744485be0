use super::{RawVisualEdge, RawVisualNode, RawVisualTree, RenderEngine, VisualTree};
use crate::error::RenderError;
use crate::geom::BBox;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::OnceLock;

/// Reads a pre-rendered Mermaid SVG document instead of rendering live.
///
/// The document is parsed on every call, so the engine can be shared across threads.
#[derive(Debug, Clone)]
pub struct SvgEngine {
    svg: String,
}

impl SvgEngine {
    pub fn new(svg: impl Into<String>) -> Self {
        Self { svg: svg.into() }
    }
}

impl RenderEngine for SvgEngine {
    fn render(&self, _source: &str) -> Result<VisualTree, RenderError> {
        read_svg(&self.svg)
    }
}

fn re_translate() -> &'static Regex {
    static ONCE: OnceLock<Regex> = OnceLock::new();
    ONCE.get_or_init(|| {
        Regex::new(r"translate\(\s*([-+0-9.eE]+)(?:[\s,]+([-+0-9.eE]+))?\s*\)")
            .expect("valid translate regex")
    })
}

#[derive(Debug, Clone, Copy, Default)]
struct Translate {
    x: f64,
    y: f64,
}

fn parse_translate(transform: &str) -> Translate {
    let mut out = Translate::default();
    for caps in re_translate().captures_iter(transform) {
        let x = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok());
        let y = caps.get(2).and_then(|m| m.as_str().parse::<f64>().ok());
        out.x += x.unwrap_or(0.0);
        out.y += y.unwrap_or(0.0);
    }
    out
}

/// Sum of `translate(..)` components of `node` and all of its ancestors.
fn accumulated_translate(node: roxmltree::Node<'_, '_>) -> Translate {
    let mut out = Translate::default();
    for n in node.ancestors().filter(|n| n.is_element()) {
        if let Some(transform) = n.attribute("transform") {
            let t = parse_translate(transform);
            out.x += t.x;
            out.y += t.y;
        }
    }
    out
}

fn has_class(node: roxmltree::Node<'_, '_>, class: &str) -> bool {
    node.attribute("class")
        .is_some_and(|c| c.split_whitespace().any(|t| t == class))
}

fn class_list(node: roxmltree::Node<'_, '_>) -> Vec<String> {
    node.attribute("class")
        .map(|c| c.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

fn num_attr(node: roxmltree::Node<'_, '_>, name: &str) -> Option<f64> {
    node.attribute(name)?.trim().parse::<f64>().ok()
}

fn text_fragments(node: roxmltree::Node<'_, '_>) -> Vec<String> {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .map(str::to_string)
        .collect()
}

/// Local bbox of a bounding primitive, before transforms.
fn shape_bbox(shape: roxmltree::Node<'_, '_>) -> Option<BBox> {
    match shape.tag_name().name() {
        "rect" => Some(BBox::new(
            num_attr(shape, "x").unwrap_or(0.0),
            num_attr(shape, "y").unwrap_or(0.0),
            num_attr(shape, "width")?,
            num_attr(shape, "height")?,
        )),
        "ellipse" => {
            let (cx, cy) = (
                num_attr(shape, "cx").unwrap_or(0.0),
                num_attr(shape, "cy").unwrap_or(0.0),
            );
            let (rx, ry) = (num_attr(shape, "rx")?, num_attr(shape, "ry")?);
            Some(BBox::new(cx - rx, cy - ry, 2.0 * rx, 2.0 * ry))
        }
        "circle" => {
            let (cx, cy) = (
                num_attr(shape, "cx").unwrap_or(0.0),
                num_attr(shape, "cy").unwrap_or(0.0),
            );
            let r = num_attr(shape, "r")?;
            Some(BBox::new(cx - r, cy - r, 2.0 * r, 2.0 * r))
        }
        "polygon" => {
            let nums = shape
                .attribute("points")?
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<f64>().ok())
                .collect::<Option<Vec<_>>>()?;
            BBox::from_points(nums.chunks_exact(2).map(|p| (p[0], p[1])))
        }
        _ => None,
    }
}

/// First bounding primitive of a node group, skipping the label's own background rect.
fn node_bbox(group: roxmltree::Node<'_, '_>) -> Option<BBox> {
    let shape = group.descendants().skip(1).find(|n| {
        n.is_element()
            && matches!(
                n.tag_name().name(),
                "rect" | "ellipse" | "circle" | "polygon"
            )
            && !n
                .ancestors()
                .skip(1)
                .take_while(|a| *a != group)
                .any(|a| has_class(a, "label"))
    })?;
    let local = shape_bbox(shape)?;
    let t = accumulated_translate(shape);
    Some(local.translate(t.x, t.y))
}

fn is_node_group(n: roxmltree::Node<'_, '_>) -> bool {
    n.is_element()
        && n.tag_name().name() == "g"
        && (n
            .attribute("id")
            .is_some_and(|id| id.starts_with("flowchart-"))
            || has_class(n, "node"))
}

/// Reads the visual tree out of a Mermaid flowchart SVG document.
///
/// Nodes are `g` elements whose id starts with `flowchart-` or whose class list contains
/// `node`. Edges are `path[data-edge="true"]`, `g.edgePath` groups, or id-carrying paths directly
/// under `g.edgePaths`. Edge labels come from `g.edgeLabel` groups keyed by `data-id`.
pub fn read_svg(svg: &str) -> Result<VisualTree, RenderError> {
    let doc = roxmltree::Document::parse(svg).map_err(|e| RenderError::InvalidOutput {
        message: e.to_string(),
    })?;
    let root = doc.root_element();
    if root.tag_name().name() != "svg" {
        return Err(RenderError::InvalidOutput {
            message: format!("root element is <{}>, expected <svg>", root.tag_name().name()),
        });
    }

    let mut edge_labels: FxHashMap<&str, Vec<String>> = FxHashMap::default();
    for n in doc.descendants().filter(|n| n.is_element() && has_class(*n, "edgeLabel")) {
        let data_id = n
            .descendants()
            .find_map(|d| d.attribute("data-id"))
            .or_else(|| n.attribute("id"));
        if let Some(id) = data_id {
            edge_labels.entry(id).or_insert_with(|| text_fragments(n));
        }
    }

    let mut raw = RawVisualTree::default();
    let mut seen_paths: FxHashSet<roxmltree::NodeId> = FxHashSet::default();

    for n in doc.descendants().filter(|n| n.is_element()) {
        if is_node_group(n) {
            let Some(id) = n.attribute("id") else {
                continue;
            };
            raw.nodes.push(RawVisualNode {
                id: id.to_string(),
                fragments: text_fragments(n),
                class_list: class_list(n),
                bbox: node_bbox(n),
            });
            continue;
        }

        let (id, path) = if n.tag_name().name() == "g" && has_class(n, "edgePath") {
            let path = n
                .descendants()
                .find(|d| d.is_element() && d.tag_name().name() == "path");
            (n.attribute("id"), path)
        } else if n.tag_name().name() == "path"
            && (n.attribute("data-edge") == Some("true")
                || n.parent_element().is_some_and(|p| has_class(p, "edgePaths")))
        {
            (n.attribute("id"), Some(n))
        } else {
            continue;
        };
        let Some(id) = id else {
            continue;
        };
        if let Some(path) = path {
            if !seen_paths.insert(path.id()) {
                continue;
            }
        }
        raw.edges.push(RawVisualEdge {
            id: id.to_string(),
            fragments: edge_labels.get(id).cloned().unwrap_or_default(),
            d: path.and_then(|p| p.attribute("d")).map(str::to_string),
            matrix: path
                .map(accumulated_translate)
                .filter(|t| t.x != 0.0 || t.y != 0.0)
                .map(|t| [1.0, 0.0, 0.0, 1.0, t.x, t.y]),
        });
    }

    tracing::debug!(
        nodes = raw.nodes.len(),
        edges = raw.edges.len(),
        "read visual tree from svg"
    );
    Ok(raw.into())
}
