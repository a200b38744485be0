//! Merges the logical graph and the visual tree into a [`Scene`].
//!
//! Assembly is total: missing visual counterparts leave `None` fields behind, they never fail
//! the pass.

use crate::correlate::{self, CorrelateOptions};
use crate::model::{LogicalGraph, LogicalNode};
use crate::scene::{Scene, SceneEdge, SceneNode};
use crate::visual::VisualTree;
use indexmap::IndexSet;

/// Strips a leading logical name the engine prepended to the label text (`"B: Browser"`,
/// `"B - Browser"`, `"B Browser"`). Returns `None` when there is nothing to strip or nothing
/// would be left.
pub fn strip_logical_name<'a>(rendered: &'a str, logical_id: &str) -> Option<&'a str> {
    let rest = rendered.trim().strip_prefix(logical_id)?;
    let first = rest.chars().next()?;
    if !(first.is_whitespace() || matches!(first, ':' | '-' | '|' | '.')) {
        return None;
    }
    let stripped = rest
        .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '-' | '|' | '.'))
        .trim_end();
    (!stripped.is_empty()).then_some(stripped)
}

/// Label priority: declared bracket label, then the rendered label with a decorating logical
/// name removed, then the rendered label as-is, then the identifier.
pub fn resolve_node_label(
    logical_id: &str,
    declared: Option<&str>,
    rendered: Option<&str>,
) -> String {
    if let Some(declared) = declared.filter(|d| !d.trim().is_empty()) {
        return declared.to_string();
    }
    if let Some(rendered) = rendered {
        if let Some(stripped) = strip_logical_name(rendered, logical_id) {
            return stripped.to_string();
        }
        return rendered.to_string();
    }
    logical_id.to_string()
}

/// Declared nodes followed by implicit nodes for edge endpoints that were never declared.
fn scene_nodes(graph: &LogicalGraph) -> Vec<(LogicalNode, bool)> {
    let declared = graph
        .nodes
        .iter()
        .map(|n| n.id.as_str())
        .collect::<IndexSet<_>>();
    let mut implicit: IndexSet<&str> = IndexSet::new();
    for edge in &graph.edges {
        for id in [edge.from.as_str(), edge.to.as_str()] {
            if !declared.contains(id) {
                implicit.insert(id);
            }
        }
    }
    if !implicit.is_empty() {
        tracing::debug!(
            implicit = implicit.len(),
            "synthesized nodes for undeclared edge endpoints"
        );
    }

    graph
        .nodes
        .iter()
        .cloned()
        .map(|n| (n, false))
        .chain(implicit.into_iter().map(|id| (graph.implicit_node(id), true)))
        .collect()
}

pub fn assemble(graph: &LogicalGraph, tree: &VisualTree, options: &CorrelateOptions) -> Scene {
    let nodes = scene_nodes(graph);
    let ids = nodes.iter().map(|(n, _)| n.id.as_str()).collect::<Vec<_>>();
    let correlation = correlate::correlate_nodes(&ids, &tree.nodes, options);

    let scene_nodes = nodes
        .into_iter()
        .map(|(node, implicit)| {
            let visual = correlation.get(&node.id).map(|m| &tree.nodes[m.index]);
            let label = resolve_node_label(
                &node.id,
                node.label.as_deref(),
                visual.and_then(|v| v.label.as_deref()),
            );
            SceneNode {
                label,
                visual_id: visual.map(|v| v.id.clone()),
                class_name: node.class_name,
                class_list: visual.map(|v| v.class_list.clone()).unwrap_or_default(),
                bbox: visual.and_then(|v| v.bbox),
                implicit,
                id: node.id,
            }
        })
        .collect::<Vec<_>>();

    let edge_matches = correlate::correlate_edges(&graph.edges, &tree.edges);
    let scene_edges = graph
        .edges
        .iter()
        .zip(edge_matches)
        .map(|(edge, index)| {
            let visual = index.map(|i| &tree.edges[i]);
            SceneEdge {
                from: edge.from.clone(),
                to: edge.to.clone(),
                from_id: correlation.visual_id(&edge.from).map(str::to_string),
                to_id: correlation.visual_id(&edge.to).map(str::to_string),
                visual_id: visual.map(|v| v.id.clone()),
                label: edge
                    .label
                    .clone()
                    .or_else(|| visual.and_then(|v| v.label.clone())),
                path: visual.and_then(|v| v.path),
            }
        })
        .collect::<Vec<_>>();

    for (class_name, id) in scene_nodes
        .iter()
        .filter_map(|n| n.class_name.as_deref().map(|c| (c, n.id.as_str())))
    {
        if !graph.class_defs.contains_key(class_name) {
            tracing::debug!(node = id, class_name, "style class has no classDef");
        }
    }

    Scene {
        direction: graph.direction.clone(),
        nodes: scene_nodes,
        edges: scene_edges,
        class_defs: graph.class_defs.clone(),
    }
}
