//! Maps logical identifiers onto the element ids a layout engine assigned.
//!
//! Mermaid embeds the logical name in a synthetic id (`flowchart-<name>-<n>`), so a name that is
//! a prefix of another name (`A` vs `A-B`) can match several elements. Rather than taking the
//! first hit, every candidate is collected and a fixed tie-break picks the winner:
//!
//! 1. candidates whose remaining suffix is a bare counter (`-0`, `-12`) before any other,
//! 2. then the shortest suffix,
//! 3. then document order.
//!
//! Elements already claimed by another identifier are skipped, so the mapping is injective.

use crate::model::LogicalEdge;
use crate::visual::{VisualEdge, VisualNode};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

pub const DEFAULT_NODE_PREFIX: &str = "flowchart-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelateOptions {
    /// Prefix the engine puts in front of the logical name in node element ids.
    pub node_prefix: String,
}

impl Default for CorrelateOptions {
    fn default() -> Self {
        Self {
            node_prefix: DEFAULT_NODE_PREFIX.to_string(),
        }
    }
}

impl CorrelateOptions {
    pub fn with_node_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.node_prefix = prefix.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Confidence {
    /// One unclaimed candidate with a bare counter suffix.
    Exact,
    /// Several unclaimed counter-suffixed candidates; the tie-break decided.
    Ambiguous,
    /// No counter-suffixed candidate was left; the winner's suffix is something else.
    Inexact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMatch {
    /// Index into the visual node list.
    pub index: usize,
    pub visual_id: String,
    pub confidence: Confidence,
    /// Every element id that matched the naming pattern, claimed or not.
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeCorrelation {
    matches: IndexMap<String, NodeMatch>,
}

impl NodeCorrelation {
    pub fn get(&self, logical_id: &str) -> Option<&NodeMatch> {
        self.matches.get(logical_id)
    }

    pub fn visual_id(&self, logical_id: &str) -> Option<&str> {
        self.get(logical_id).map(|m| m.visual_id.as_str())
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &NodeMatch)> {
        self.matches.iter().map(|(k, v)| (k.as_str(), v))
    }
}

struct Candidate<'a> {
    index: usize,
    visual_id: &'a str,
    suffix: &'a str,
    counter: bool,
}

fn node_candidates<'a>(
    logical_id: &str,
    nodes: &'a [VisualNode],
    prefix: &str,
) -> Vec<Candidate<'a>> {
    let mut out = nodes
        .iter()
        .enumerate()
        .filter_map(|(index, node)| {
            let suffix = node
                .id
                .strip_prefix(prefix)?
                .strip_prefix(logical_id)?
                .strip_prefix('-')?;
            Some(Candidate {
                index,
                visual_id: &node.id,
                suffix,
                counter: !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()),
            })
        })
        .collect::<Vec<_>>();
    // Stable sort keeps document order as the last tie-break.
    out.sort_by_key(|c| (!c.counter, c.suffix.len()));
    out
}

/// Correlates logical node identifiers with rendered nodes.
///
/// Counter-suffixed candidates are assigned for every identifier before any identifier may fall
/// back to an inexact one, so `A` cannot take `flowchart-A-B-0` away from `A-B`. Unmatched
/// identifiers are simply absent from the result; the rest keep the given order.
pub fn correlate_nodes<S: AsRef<str>>(
    logical_ids: &[S],
    nodes: &[VisualNode],
    options: &CorrelateOptions,
) -> NodeCorrelation {
    let candidates = logical_ids
        .iter()
        .map(|id| node_candidates(id.as_ref(), nodes, &options.node_prefix))
        .collect::<Vec<_>>();
    let mut claimed: FxHashSet<usize> = FxHashSet::default();
    let mut winners: Vec<Option<(usize, Confidence)>> = vec![None; logical_ids.len()];

    for (slot, cands) in winners.iter_mut().zip(&candidates) {
        let open = cands
            .iter()
            .enumerate()
            .filter(|(_, c)| c.counter && !claimed.contains(&c.index))
            .collect::<Vec<_>>();
        let Some(&(k, winner)) = open.first() else {
            continue;
        };
        let confidence = if open.len() > 1 {
            Confidence::Ambiguous
        } else {
            Confidence::Exact
        };
        claimed.insert(winner.index);
        *slot = Some((k, confidence));
    }

    for (slot, cands) in winners.iter_mut().zip(&candidates) {
        if slot.is_some() {
            continue;
        }
        if let Some((k, winner)) = cands
            .iter()
            .enumerate()
            .find(|(_, c)| !claimed.contains(&c.index))
        {
            claimed.insert(winner.index);
            *slot = Some((k, Confidence::Inexact));
        }
    }

    let mut matches = IndexMap::new();
    for ((logical_id, cands), slot) in logical_ids.iter().zip(&candidates).zip(winners) {
        let logical_id = logical_id.as_ref();
        let Some((k, confidence)) = slot else {
            tracing::debug!(logical_id, "no rendered node for logical id");
            continue;
        };
        let winner = &cands[k];
        if confidence != Confidence::Exact {
            tracing::warn!(
                logical_id,
                visual_id = winner.visual_id,
                candidates = cands.len(),
                ?confidence,
                "node correlation needed a tie-break"
            );
        }
        matches.insert(
            logical_id.to_string(),
            NodeMatch {
                index: winner.index,
                visual_id: winner.visual_id.to_string(),
                confidence,
                candidates: cands.iter().map(|c| c.visual_id.to_string()).collect(),
            },
        );
    }

    NodeCorrelation { matches }
}

/// `true` when `visual_id` is an edge id encoding `from` and `to`: `L_<from>_<to>_<n>` or
/// `L-<from>-<to>-<n>`.
pub fn edge_id_matches(visual_id: &str, from: &str, to: &str) -> bool {
    ['_', '-'].iter().any(|&sep| {
        let Some(rest) = visual_id.strip_prefix('L').and_then(|r| r.strip_prefix(sep)) else {
            return false;
        };
        let Some(rest) = rest.strip_prefix(from).and_then(|r| r.strip_prefix(sep)) else {
            return false;
        };
        let Some(counter) = rest.strip_prefix(to).and_then(|r| r.strip_prefix(sep)) else {
            return false;
        };
        !counter.is_empty() && counter.bytes().all(|b| b.is_ascii_digit())
    })
}

/// For each logical edge, the index of its rendered edge.
///
/// Rendered edges are matched by the endpoints encoded in their ids first. Logical edges left
/// over fall back to the rendered edge at the same position, but only when both lists have the
/// same length. Each rendered edge is used at most once.
pub fn correlate_edges(logical: &[LogicalEdge], visual: &[VisualEdge]) -> Vec<Option<usize>> {
    let mut claimed: FxHashSet<usize> = FxHashSet::default();
    let mut out = logical
        .iter()
        .map(|edge| {
            let index = visual.iter().enumerate().find_map(|(i, v)| {
                (!claimed.contains(&i) && edge_id_matches(&v.id, &edge.from, &edge.to))
                    .then_some(i)
            })?;
            claimed.insert(index);
            Some(index)
        })
        .collect::<Vec<_>>();

    if logical.len() == visual.len() {
        for (k, slot) in out.iter_mut().enumerate() {
            if slot.is_none() && claimed.insert(k) {
                *slot = Some(k);
            }
        }
    }

    let unmatched = out.iter().filter(|s| s.is_none()).count();
    if unmatched > 0 {
        tracing::debug!(
            unmatched,
            logical = logical.len(),
            rendered = visual.len(),
            "logical edges without rendered geometry"
        );
    }
    out
}
