// src/deps/solver.rs

//! Dependency queries over a population of projects.

use std::collections::BTreeSet;

use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Dfs;
use tracing::{debug, warn};

use crate::deps::node::DependencyNode;
use crate::deps::sort::{topological_sort, DependencyGraph};
use crate::errors::{QitreeError, Result};
use crate::types::{CyclePolicy, DepType};

/// Build the name -> dependencies mapping for the given edge kinds.
///
/// Rebuilt on every query: edge sets may change between two calls (for
/// instance after switching build profile).
pub fn gen_deps<N: DependencyNode>(nodes: &[N], dep_types: &[DepType]) -> DependencyGraph {
    nodes
        .iter()
        .map(|node| {
            let deps = node.depends_for(dep_types).into_iter().collect();
            (node.name().to_string(), deps)
        })
        .collect()
}

/// Solves dependencies across the projects of a worktree.
///
/// Holds a borrowed snapshot of the nodes and never mutates them, so it is
/// safe to use from several threads on the same population.
#[derive(Debug)]
pub struct DepsSolver<'a, N> {
    nodes: &'a [N],
}

impl<'a, N: DependencyNode> DepsSolver<'a, N> {
    pub fn new(nodes: &'a [N]) -> Self {
        Self { nodes }
    }

    pub fn get(&self, name: &str) -> Option<&'a N> {
        self.nodes.iter().find(|n| n.name() == name)
    }

    /// Names of the closure of `heads`, every dependency before its
    /// dependents, heads last.
    ///
    /// Dependencies on names outside the population are kept in the order
    /// as leaves; asking for an unknown head is an error.
    pub fn sorted_names<S: AsRef<str>>(
        &self,
        heads: &[S],
        dep_types: &[DepType],
        policy: CyclePolicy,
    ) -> Result<Vec<String>> {
        for head in heads {
            let head: &str = head.as_ref();
            if self.get(head).is_none() {
                return Err(QitreeError::UnknownNode(head.to_string()));
            }
        }

        let graph = gen_deps(self.nodes, dep_types);
        let names = topological_sort(&graph, heads, policy)?;
        debug!(?dep_types, ?names, "solved dependencies");
        Ok(names)
    }

    /// Like [`Self::sorted_names`], but mapped back to the known nodes.
    ///
    /// Names that are not part of the population (toolchain packages, for
    /// instance) are dropped.
    pub fn dep_nodes<S: AsRef<str>>(
        &self,
        heads: &[S],
        dep_types: &[DepType],
        policy: CyclePolicy,
    ) -> Result<Vec<&'a N>> {
        let names = self.sorted_names(heads, dep_types, policy)?;
        Ok(names.iter().filter_map(|name| self.get(name)).collect())
    }

    /// The projects `project` depends on, itself excluded.
    pub fn sdk_dependencies(&self, project: &str, dep_types: &[DepType]) -> Result<Vec<&'a N>> {
        let nodes = self.dep_nodes(&[project], dep_types, CyclePolicy::Break)?;
        Ok(nodes.into_iter().filter(|n| n.name() != project).collect())
    }

    /// Known projects listed as host dependencies anywhere in the full
    /// build/run/test closure of `heads`, sorted by name.
    pub fn host_names<S: AsRef<str>>(&self, heads: &[S]) -> Result<Vec<String>> {
        let closure = self.dep_nodes(heads, &DepType::ALL, CyclePolicy::Break)?;
        let host: BTreeSet<&str> = closure
            .iter()
            .flat_map(|node| node.host_depends().iter())
            .map(String::as_str)
            .filter(|name| self.get(name).is_some())
            .collect();
        Ok(host.into_iter().map(str::to_string).collect())
    }

    /// Projects that list one of `targets` directly in a selected edge set.
    ///
    /// Only one hop is followed; see [`Self::transitive_reverse_dependents`]
    /// for the full closure.
    pub fn direct_reverse_dependents<S: AsRef<str>>(
        &self,
        targets: &[S],
        dep_types: &[DepType],
    ) -> BTreeSet<String> {
        self.warn_unknown(targets);

        let mut dependents = BTreeSet::new();
        for node in self.nodes {
            let hit = dep_types.iter().any(|dep_type| {
                let deps = node.depends(*dep_type);
                targets.iter().any(|t| {
                    let t: &str = t.as_ref();
                    deps.contains(t)
                })
            });
            if hit {
                dependents.insert(node.name().to_string());
            }
        }
        dependents
    }

    /// Every project that reaches one of `targets` through selected edges.
    pub fn transitive_reverse_dependents<S: AsRef<str>>(
        &self,
        targets: &[S],
        dep_types: &[DepType],
    ) -> BTreeSet<String> {
        self.warn_unknown(targets);

        let deps = gen_deps(self.nodes, dep_types);

        // Edge direction: dep -> dependent, so a walk from a target visits
        // everything that depends on it.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for (name, node_deps) in deps.iter() {
            graph.add_node(name.as_str());
            for dep in node_deps {
                graph.add_edge(dep.as_str(), name.as_str(), ());
            }
        }

        let mut dependents = BTreeSet::new();
        for target in targets {
            let target: &str = target.as_ref();
            if !graph.contains_node(target) {
                continue;
            }
            let mut dfs = Dfs::new(&graph, target);
            while let Some(name) = dfs.next(&graph) {
                if name != target {
                    dependents.insert(name.to_string());
                }
            }
        }
        dependents
    }

    fn warn_unknown<S: AsRef<str>>(&self, names: &[S]) {
        for name in names {
            let name: &str = name.as_ref();
            if self.get(name).is_none() {
                warn!(project = %name, "reverse query for unknown project");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deps::node::Project;

    fn project(name: &str, build: &[&str], run: &[&str], test: &[&str]) -> Project {
        let mut p = Project::new(name);
        p.build_depends = build.iter().map(|s| s.to_string()).collect();
        p.run_depends = run.iter().map(|s| s.to_string()).collect();
        p.test_depends = test.iter().map(|s| s.to_string()).collect();
        p
    }

    #[test]
    fn gen_deps_unions_selected_edges_in_lexicographic_order() {
        let nodes = vec![project("world", &["zlib"], &["boost"], &["gtest"])];

        let graph = gen_deps(&nodes, &[DepType::Build, DepType::Test]);
        assert_eq!(graph["world"], vec!["gtest", "zlib"]);

        let graph = gen_deps(&nodes, &DepType::ALL);
        assert_eq!(graph["world"], vec!["boost", "gtest", "zlib"]);
    }

    #[test]
    fn unknown_head_is_rejected() {
        let nodes = vec![project("world", &[], &[], &[])];
        let solver = DepsSolver::new(&nodes);

        match solver.sorted_names(&["hello"], &DepType::ALL, CyclePolicy::Break) {
            Err(QitreeError::UnknownNode(name)) => assert_eq!(name, "hello"),
            other => panic!("expected UnknownNode, got {other:?}"),
        }
    }

    #[test]
    fn sdk_dependencies_excludes_the_project_itself() {
        let nodes = vec![
            project("hello", &["world"], &[], &[]),
            project("world", &[], &[], &[]),
        ];
        let solver = DepsSolver::new(&nodes);

        let deps = solver.sdk_dependencies("hello", &[DepType::Build]).unwrap();
        let names: Vec<_> = deps.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["world"]);
    }
}
