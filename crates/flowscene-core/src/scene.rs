use crate::geom::{BBox, PathEnds};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The reconciled scene graph handed to the animation stage.
///
/// Reconciling the same source twice yields equal scenes except for `visualId`, `fromId` and
/// `toId`, which carry engine-assigned ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    pub nodes: Vec<SceneNode>,
    pub edges: Vec<SceneEdge>,
    pub class_defs: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneNode {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    /// CSS classes of the rendered element.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub class_list: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BBox>,
    /// Referenced by an edge but never declared at the start of a statement.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub implicit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneEdge {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_id: Option<String>,
    pub label: Option<String>,
    #[serde(flatten)]
    pub path: Option<PathEnds>,
}
