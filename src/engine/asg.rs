//! Abstract syntax graph
//!
//! The result of a parse is a graph rather than a tree: every node is a
//! [`MatchClass`], and a node with several [`Match`]es is ambiguous. Nodes
//! are shared between all derivations that use them, so the graph stays
//! polynomial even when the number of trees is exponential.
//!
//! The graph is built once from the dispatchers' published spans, pruned
//! to what the root reaches, and never modified afterwards.

use super::grammar::{Grammar, SymbolId};
use super::matching::{Match, MatchCategory, MatchClass};
use super::table::{FastMap, FastSet};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A pruned, immutable abstract syntax graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbstractSyntaxGraph {
    root: MatchClass,
    nodes: FastMap<MatchClass, Vec<Match>>,
}

/// JSON shape of one node
#[derive(Serialize, Deserialize)]
struct NodeRecord {
    class: MatchClass,
    matches: Vec<Match>,
}

/// JSON shape of a graph
#[derive(Serialize, Deserialize)]
struct GraphRecord {
    root: MatchClass,
    nodes: Vec<NodeRecord>,
}

impl AbstractSyntaxGraph {
    /// Build the graph of everything reachable from `root`
    ///
    /// If `root` itself has no derivation the graph is empty.
    pub(crate) fn pruned(root: MatchClass, mut nodes: FastMap<MatchClass, Vec<Match>>) -> Self {
        let mut kept = FastMap::with_capacity_and_hasher(nodes.len(), ahash::RandomState::new());
        let mut seen: FastSet<MatchClass> = FastSet::default();
        let mut queue = VecDeque::new();

        if nodes.contains_key(&root) {
            seen.insert(root);
            queue.push_back(root);
        }

        while let Some(class) = queue.pop_front() {
            let Some(matches) = nodes.remove(&class) else {
                continue;
            };
            for m in &matches {
                for &child in &m.children {
                    if seen.insert(child) {
                        queue.push_back(child);
                    }
                }
            }
            kept.insert(class, matches);
        }

        Self { root, nodes: kept }
    }

    /// The span the parse was asked to cover
    #[inline]
    pub fn root(&self) -> MatchClass {
        self.root
    }

    /// Whether the root has no derivation
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether any node has more than one derivation
    pub fn is_ambiguous(&self) -> bool {
        self.nodes.values().any(|matches| matches.len() > 1)
    }

    /// Derivations of a node, in sorted order
    pub fn get(&self, class: &MatchClass) -> Option<&[Match]> {
        self.nodes.get(class).map(Vec::as_slice)
    }

    /// Whether a node is part of the graph
    pub fn contains(&self, class: &MatchClass) -> bool {
        self.nodes.contains_key(class)
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes in ascending class order
    pub fn classes(&self) -> Vec<MatchClass> {
        let mut classes: Vec<_> = self.nodes.keys().copied().collect();
        classes.sort();
        classes
    }

    /// Iterate over nodes in unspecified order
    pub fn nodes(&self) -> impl Iterator<Item = (&MatchClass, &[Match])> {
        self.nodes.iter().map(|(c, m)| (c, m.as_slice()))
    }

    /// Render the graph as an indented outline, with symbol names
    pub fn outline(&self, grammar: &Grammar) -> String {
        let mut output = String::new();
        for class in self.classes() {
            output.push_str(&format!(
                "{}@{}..{}\n",
                grammar.name(class.symbol()),
                class.position(),
                class.end()
            ));
            for m in &self.nodes[&class] {
                let children: Vec<_> = m
                    .children
                    .iter()
                    .map(|c| format!("{}@{}", grammar.name(c.symbol()), c.position()))
                    .collect();
                output.push_str(&format!("  -> [{}]\n", children.join(", ")));
            }
        }
        output
    }

    /// Serialize to JSON, nodes in ascending class order
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let record = GraphRecord {
            root: self.root,
            nodes: self
                .classes()
                .into_iter()
                .map(|class| NodeRecord {
                    class,
                    matches: self.nodes[&class].clone(),
                })
                .collect(),
        };
        serde_json::to_string(&record)
    }

    /// Deserialize from JSON produced by [`to_json`](Self::to_json)
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        let record: GraphRecord = serde_json::from_str(s)?;
        Ok(Self {
            root: record.root,
            nodes: record
                .nodes
                .into_iter()
                .map(|n| (n.class, n.matches))
                .collect(),
        })
    }
}

/// A category that was queried but never matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PossibleError {
    /// The failed category
    pub category: MatchCategory,
    /// Whether every place that asked for it was satisfied by a sibling
    pub bypassed: bool,
}

impl PossibleError {
    /// Position of the failure
    #[inline]
    pub fn position(&self) -> usize {
        self.category.position
    }

    /// Symbol that failed to match
    #[inline]
    pub fn symbol(&self) -> SymbolId {
        self.category.symbol
    }
}

/// Rank the categories that were queried but never matched
///
/// A *site* is the set of categories one walker asked for at once. A
/// failure is not bypassed when at least one of its sites had no
/// successful sibling. Non-bypassed failures come first, then bypassed
/// ones; within each group by position descending, then symbol ascending.
pub(crate) fn rank_possible_errors(
    queried: &[MatchCategory],
    succeeded: &FastSet<MatchCategory>,
    sites: &[Vec<MatchCategory>],
) -> Vec<PossibleError> {
    let mut unbypassed: FastSet<MatchCategory> = FastSet::default();
    for site in sites {
        if site.iter().all(|c| !succeeded.contains(c)) {
            unbypassed.extend(site.iter().copied());
        }
    }

    let mut errors: Vec<_> = queried
        .iter()
        .filter(|c| !succeeded.contains(*c))
        .map(|&category| PossibleError {
            category,
            bypassed: !unbypassed.contains(&category),
        })
        .collect();

    errors.sort_by(|a, b| {
        a.bypassed
            .cmp(&b.bypassed)
            .then(b.category.position.cmp(&a.category.position))
            .then(a.category.symbol.cmp(&b.category.symbol))
    });
    errors.dedup();
    errors
}
