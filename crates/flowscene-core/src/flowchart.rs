//! Flowchart source reading.
//!
//! Source text is split into statements ([`lexer`]) and each statement is classified into a
//! typed [`StatementKind`] ([`classify`]). The extractors in [`extract`] then run over that one
//! typed sequence, so every extractor observes the same statements in the same source order.

mod classify;
pub mod extract;
mod lexer;
mod link;
mod text;

pub use extract::{class_defs, edges, node_classes, node_ids, node_labels};
pub use lexer::RawStatement;

/// A reference to a node as written in source: `Id`, `Id[label]`, `Id:::Class`, or both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRef {
    pub id: String,
    /// Text between the shape delimiters, raw unless the whole label was quoted.
    pub label: Option<String>,
    /// Class applied through a trailing `:::Name`.
    pub class_name: Option<String>,
}

impl NodeRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            class_name: None,
        }
    }
}

/// A connector between two adjacent node references of a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub label: Option<String>,
    /// `false` for runs without an arrow terminator (`---`, `-.-`, `===`).
    pub directed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    /// `flowchart LR` / `graph TD`. `TD` is normalized to `TB`.
    Header {
        keyword: String,
        direction: Option<String>,
    },
    /// A lone node reference at statement start.
    NodeDecl(NodeRef),
    /// `A --> B`, `A -- "x" --> B --> C`, ...
    ///
    /// `nodes.len() == links.len() + 1`; link `i` connects `nodes[i]` to `nodes[i + 1]`.
    Edges { nodes: Vec<NodeRef>, links: Vec<Link> },
    /// `classDef a,b fill:#fff,stroke:#222`
    ClassDef { names: Vec<String>, style: String },
    /// `class A,B Name`
    ClassAssign {
        targets: Vec<String>,
        class_name: String,
    },
    /// Statements that carry nothing for the scene (`subgraph`, `end`, `style`, `click`, ...)
    /// or that could not be read.
    Other { keyword: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub line: usize,
    pub kind: StatementKind,
}

/// Flowchart source as a typed statement sequence, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub statements: Vec<Statement>,
}

impl Document {
    pub fn parse(text: &str) -> Self {
        let statements = lexer::StatementSplitter::new(text)
            .map(|raw| Statement {
                line: raw.line,
                kind: classify::classify(raw.text),
            })
            .collect::<Vec<_>>();

        let unread = statements
            .iter()
            .filter(|s| matches!(s.kind, StatementKind::Other { keyword: None }))
            .count();
        tracing::debug!(
            statements = statements.len(),
            unread,
            "classified flowchart statements"
        );

        Self { statements }
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatementKind> {
        self.statements.iter().map(|s| &s.kind)
    }

    /// Direction from the first header statement.
    pub fn direction(&self) -> Option<&str> {
        self.iter().find_map(|kind| match kind {
            StatementKind::Header { direction, .. } => direction.as_deref(),
            _ => None,
        })
    }

    /// Every node reference in source order, including edge endpoints.
    pub fn node_refs(&self) -> impl Iterator<Item = &NodeRef> {
        const NONE: &[NodeRef] = &[];
        self.iter().flat_map(|kind| match kind {
            StatementKind::NodeDecl(node) => std::slice::from_ref(node),
            StatementKind::Edges { nodes, .. } => nodes.as_slice(),
            _ => NONE,
        })
    }
}

/// Splits source into raw statements without classifying them.
pub fn split_statements(text: &str) -> impl Iterator<Item = RawStatement<'_>> {
    lexer::StatementSplitter::new(text)
}
