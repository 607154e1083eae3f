// src/deps/sort.rs

//! Depth-first topological sort over a name -> dependencies mapping.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::errors::CycleError;
use crate::types::CyclePolicy;

/// Name -> direct dependencies, in the order they must be visited.
///
/// Dependency names missing from the keys are leaves.
pub type DependencyGraph = BTreeMap<String, Vec<String>>;

/// Sort the closure of `heads` so that every node comes after its
/// dependencies.
///
/// Several heads behave as if a synthetic head depended on all of them in
/// the given order: the closure of the first head comes first, then what
/// the second head adds, and so on.
///
/// With [`CyclePolicy::Break`] the sort always finds an order, even if the
/// data is not a DAG: a node reached again while it is still being visited
/// is skipped, and appended once its own visit completes. So for
/// `a -> b -> a` with head `a` the result is `[b, a]`.
pub fn topological_sort<S: AsRef<str>>(
    graph: &DependencyGraph,
    heads: &[S],
    policy: CyclePolicy,
) -> Result<Vec<String>, CycleError> {
    let mut visitor = Visitor::new(graph, policy);
    for head in heads {
        visitor.visit(head.as_ref(), None)?;
    }
    Ok(visitor.result)
}

/// Check that the whole graph is acyclic, starting a strict visit from
/// every node in key order.
pub fn assert_dag(graph: &DependencyGraph) -> Result<(), CycleError> {
    let mut visitor = Visitor::new(graph, CyclePolicy::Error);
    for node in graph.keys() {
        visitor.visit(node, None)?;
    }
    Ok(())
}

struct Visitor<'g> {
    graph: &'g DependencyGraph,
    policy: CyclePolicy,
    result: Vec<String>,
    finalized: HashSet<String>,
    /// Nodes whose visit is in progress, outermost first.
    path: Vec<String>,
}

impl<'g> Visitor<'g> {
    fn new(graph: &'g DependencyGraph, policy: CyclePolicy) -> Self {
        Self {
            graph,
            policy,
            result: Vec::new(),
            finalized: HashSet::new(),
            path: Vec::new(),
        }
    }

    fn visit(&mut self, node: &str, parent: Option<&str>) -> Result<(), CycleError> {
        if self.finalized.contains(node) {
            return Ok(());
        }

        if let Some(pos) = self.path.iter().position(|n| n == node) {
            return match self.policy {
                CyclePolicy::Break => {
                    debug!(node, parent, "cycle detected; cutting it here");
                    Ok(())
                }
                CyclePolicy::Error => Err(CycleError {
                    node: node.to_string(),
                    parent: parent.unwrap_or(node).to_string(),
                    path: self.path[pos..].to_vec(),
                }),
            };
        }

        self.path.push(node.to_string());
        let graph = self.graph;
        if let Some(deps) = graph.get(node) {
            for dep in deps {
                self.visit(dep, Some(node))?;
            }
        }
        self.path.pop();

        self.finalized.insert(node.to_string());
        self.result.push(node.to_string());
        Ok(())
    }
}
