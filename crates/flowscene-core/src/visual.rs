//! The rendered side of a diagram, and the seam to whatever produces it.

mod path;
mod svg;

pub use path::parse_path_ends;
pub use svg::{SvgEngine, read_svg};

use crate::error::RenderError;
use crate::geom::{BBox, PathEnds};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualNode {
    /// Engine-assigned element id, e.g. `flowchart-A-0`.
    pub id: String,
    pub label: Option<String>,
    #[serde(default)]
    pub class_list: Vec<String>,
    pub bbox: Option<BBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualEdge {
    pub id: String,
    pub label: Option<String>,
    pub path: Option<PathEnds>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualTree {
    pub nodes: Vec<VisualNode>,
    pub edges: Vec<VisualEdge>,
}

/// Turns diagram source into a rendered visual tree.
///
/// This is the only suspension point of a reconciliation: implementations may block on an
/// external process. Correlation and assembly only ever see the returned [`VisualTree`].
pub trait RenderEngine {
    fn render(&self, source: &str) -> Result<VisualTree, RenderError>;
}

impl<T: RenderEngine + ?Sized> RenderEngine for &T {
    fn render(&self, source: &str) -> Result<VisualTree, RenderError> {
        (**self).render(source)
    }
}

impl<T: RenderEngine + ?Sized> RenderEngine for Box<T> {
    fn render(&self, source: &str) -> Result<VisualTree, RenderError> {
        (**self).render(source)
    }
}

/// Returns the same tree for every source. Used for replaying a captured render.
#[derive(Debug, Clone, Default)]
pub struct StaticEngine {
    pub tree: VisualTree,
}

impl StaticEngine {
    pub fn new(tree: VisualTree) -> Self {
        Self { tree }
    }
}

impl RenderEngine for StaticEngine {
    fn render(&self, _source: &str) -> Result<VisualTree, RenderError> {
        Ok(self.tree.clone())
    }
}

/// Node as read straight out of a rendered page, before label and geometry normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVisualNode {
    pub id: String,
    #[serde(default)]
    pub fragments: Vec<String>,
    #[serde(default)]
    pub class_list: Vec<String>,
    #[serde(default)]
    pub bbox: Option<BBox>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawVisualEdge {
    pub id: String,
    #[serde(default)]
    pub fragments: Vec<String>,
    /// Path-drawing commands of the edge's `path` element.
    #[serde(default)]
    pub d: Option<String>,
    /// `[a, b, c, d, e, f]` from the path's coordinate space to the root `svg`, when it differs.
    #[serde(default)]
    pub matrix: Option<[f64; 6]>,
}

/// Wire shape produced by page-side extraction scripts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawVisualTree {
    #[serde(default)]
    pub nodes: Vec<RawVisualNode>,
    #[serde(default)]
    pub edges: Vec<RawVisualEdge>,
}

impl From<RawVisualNode> for VisualNode {
    fn from(raw: RawVisualNode) -> Self {
        Self {
            label: join_fragments(&raw.fragments),
            id: raw.id,
            class_list: raw.class_list,
            bbox: raw
                .bbox
                .filter(|b| [b.x, b.y, b.width, b.height].iter().all(|v| v.is_finite())),
        }
    }
}

impl From<RawVisualEdge> for VisualEdge {
    fn from(raw: RawVisualEdge) -> Self {
        Self {
            label: join_fragments(&raw.fragments),
            path: raw
                .d
                .as_deref()
                .and_then(parse_path_ends)
                .map(|p| raw.matrix.map_or(p, |m| p.transform(m))),
            id: raw.id,
        }
    }
}

impl From<RawVisualTree> for VisualTree {
    fn from(raw: RawVisualTree) -> Self {
        Self {
            nodes: raw.nodes.into_iter().map(VisualNode::from).collect(),
            edges: raw.edges.into_iter().map(VisualEdge::from).collect(),
        }
    }
}

/// Joins the text fragments of a rendered element with single spaces.
///
/// Fragments are trimmed and empty ones dropped; an all-empty result is `None` so callers can
/// tell "no rendered label" apart from a label.
pub fn join_fragments<S: AsRef<str>>(fragments: &[S]) -> Option<String> {
    let joined = fragments
        .iter()
        .map(|f| f.as_ref().trim())
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (!joined.is_empty()).then_some(joined)
}
