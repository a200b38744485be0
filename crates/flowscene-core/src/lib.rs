#![forbid(unsafe_code)]

//! Reconciles Mermaid flowchart source with its rendered output into a scene graph.
//!
//! Two independent views of one diagram are merged:
//! - the logical graph read from the source text ([`LogicalGraph`]), and
//! - the visual tree produced by a layout engine ([`VisualTree`]), reached only through the
//!   [`RenderEngine`] trait.
//!
//! The result is a [`Scene`]: every logical node with its resolved label, style class and
//! bounding box, and every logical edge, in declaration order, with its path endpoints.

pub mod assemble;
pub mod correlate;
pub mod error;
pub mod flowchart;
pub mod geom;
pub mod model;
pub mod scene;
pub mod visual;

pub use assemble::assemble;
pub use correlate::{Confidence, CorrelateOptions, NodeCorrelation};
pub use error::{Error, RenderError, Result};
pub use flowchart::Document;
pub use geom::{BBox, PathEnds};
pub use model::{LogicalEdge, LogicalGraph, LogicalNode};
pub use scene::{Scene, SceneEdge, SceneNode};
pub use visual::{
    RawVisualTree, RenderEngine, StaticEngine, SvgEngine, VisualEdge, VisualNode, VisualTree,
};

/// Runs one reconciliation pass per call against a render engine.
#[derive(Debug, Clone, Default)]
pub struct Reconciler<E> {
    engine: E,
    correlate: CorrelateOptions,
}

impl<E: RenderEngine> Reconciler<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            correlate: CorrelateOptions::default(),
        }
    }

    pub fn with_correlate_options(mut self, options: CorrelateOptions) -> Self {
        self.correlate = options;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Reads the logical graph only. No render round trip.
    pub fn extract(&self, text: &str) -> Result<LogicalGraph> {
        extract(text)
    }

    /// Renders the source once and returns the visual tree as read back.
    pub fn visual_tree(&self, text: &str) -> Result<VisualTree> {
        let text = require_source(text)?;
        Ok(self.engine.render(text)?)
    }

    /// Full pass: extract, render once, correlate, assemble.
    ///
    /// A failed render fails the whole pass; no partial scene is returned.
    pub fn reconcile(&self, text: &str) -> Result<Scene> {
        let text = require_source(text)?;
        let graph = LogicalGraph::parse(text);
        let tree = self.engine.render(text)?;
        let scene = assemble(&graph, &tree, &self.correlate);
        tracing::debug!(
            nodes = scene.nodes.len(),
            edges = scene.edges.len(),
            rendered_nodes = tree.nodes.len(),
            rendered_edges = tree.edges.len(),
            "reconciled scene"
        );
        Ok(scene)
    }
}

fn require_source(text: &str) -> Result<&str> {
    if text.trim().is_empty() {
        return Err(Error::MalformedInput);
    }
    Ok(text)
}

/// Reads the logical graph of a flowchart without rendering it.
pub fn extract(text: &str) -> Result<LogicalGraph> {
    let text = require_source(text)?;
    Ok(LogicalGraph::parse(text))
}

/// One-shot reconciliation with default options.
pub fn reconcile(engine: &dyn RenderEngine, text: &str) -> Result<Scene> {
    Reconciler::new(engine).reconcile(text)
}

#[cfg(test)]
mod tests;
