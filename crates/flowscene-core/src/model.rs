use crate::flowchart::{self, Document};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalEdge {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// Everything the source text says about the diagram, before any rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalGraph {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    /// Nodes declared at a leading statement position, in first-occurrence order.
    pub nodes: Vec<LogicalNode>,
    pub edges: Vec<LogicalEdge>,
    pub class_defs: IndexMap<String, String>,
    /// Declared labels for every referenced identifier, edge endpoints included.
    #[serde(skip)]
    pub labels: IndexMap<String, String>,
    /// Style-class assignments for every referenced identifier.
    #[serde(skip)]
    pub classes: IndexMap<String, String>,
}

impl LogicalGraph {
    pub fn parse(text: &str) -> Self {
        Self::from_document(&Document::parse(text))
    }

    pub fn from_document(doc: &Document) -> Self {
        let labels = flowchart::node_labels(doc);
        let classes = flowchart::node_classes(doc);
        let nodes = flowchart::node_ids(doc)
            .into_iter()
            .map(|id| LogicalNode {
                label: labels.get(&id).cloned(),
                class_name: classes.get(&id).cloned(),
                id,
            })
            .collect();

        Self {
            direction: doc.direction().map(str::to_string),
            nodes,
            edges: flowchart::edges(doc),
            class_defs: flowchart::class_defs(doc),
            labels,
            classes,
        }
    }

    pub fn node(&self, id: &str) -> Option<&LogicalNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// A node for an identifier that is only referenced (e.g. as an edge target), carrying
    /// whatever label and class the references declared.
    pub fn implicit_node(&self, id: &str) -> LogicalNode {
        LogicalNode {
            id: id.to_string(),
            label: self.labels.get(id).cloned(),
            class_name: self.classes.get(id).cloned(),
        }
    }
}
