//! Extractors over a classified [`Document`].
//!
//! All extractors are total: statements they do not understand are skipped.

use super::{Document, StatementKind};
use crate::model::LogicalEdge;
use indexmap::{IndexMap, IndexSet};

/// Style-class name → raw style string. A later `classDef` of the same name overwrites an
/// earlier one.
pub fn class_defs(doc: &Document) -> IndexMap<String, String> {
    let mut out = IndexMap::new();
    for kind in doc.iter() {
        let StatementKind::ClassDef { names, style } = kind else {
            continue;
        };
        for name in names {
            out.insert(name.clone(), style.clone());
        }
    }
    out
}

/// Distinct identifiers that start a statement, in first-occurrence order.
pub fn node_ids(doc: &Document) -> Vec<String> {
    let mut out: IndexSet<&str> = IndexSet::new();
    for kind in doc.iter() {
        match kind {
            StatementKind::NodeDecl(node) => {
                out.insert(node.id.as_str());
            }
            StatementKind::Edges { nodes, .. } => {
                if let Some(first) = nodes.first() {
                    out.insert(first.id.as_str());
                }
            }
            _ => {}
        }
    }
    out.into_iter().map(str::to_string).collect()
}

/// Identifier → first declared bracket label, over every node reference in the source.
pub fn node_labels(doc: &Document) -> IndexMap<String, String> {
    let mut out = IndexMap::new();
    for node in doc.node_refs() {
        let Some(label) = &node.label else {
            continue;
        };
        if !out.contains_key(&node.id) {
            out.insert(node.id.clone(), label.clone());
        }
    }
    out
}

/// Identifier → style-class name. The first explicit assignment in source order wins, whether
/// it is a `:::Name` suffix or a `class` statement.
pub fn node_classes(doc: &Document) -> IndexMap<String, String> {
    let mut out: IndexMap<String, String> = IndexMap::new();
    for kind in doc.iter() {
        match kind {
            StatementKind::NodeDecl(node) => {
                if let Some(class_name) = &node.class_name {
                    out.entry(node.id.clone()).or_insert_with(|| class_name.clone());
                }
            }
            StatementKind::Edges { nodes, .. } => {
                for node in nodes {
                    if let Some(class_name) = &node.class_name {
                        out.entry(node.id.clone()).or_insert_with(|| class_name.clone());
                    }
                }
            }
            StatementKind::ClassAssign {
                targets,
                class_name,
            } => {
                for target in targets {
                    out.entry(target.clone()).or_insert_with(|| class_name.clone());
                }
            }
            _ => {}
        }
    }
    out
}

/// Logical edges in source order. A chain `A --> B --> C` yields `A→B` then `B→C`;
/// undirected links in a chain (`A --- B --> C`) contribute no edge.
pub fn edges(doc: &Document) -> Vec<LogicalEdge> {
    let mut out = Vec::new();
    for kind in doc.iter() {
        let StatementKind::Edges { nodes, links } = kind else {
            continue;
        };
        for (pair, link) in nodes.windows(2).zip(links) {
            if !link.directed {
                continue;
            }
            out.push(LogicalEdge {
                from: pair[0].id.clone(),
                to: pair[1].id.clone(),
                label: link.label.clone(),
            });
        }
    }
    out
}
