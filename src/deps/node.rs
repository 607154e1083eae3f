// src/deps/node.rs

//! What the solver needs to know about a project.

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::types::DepType;

static NO_DEPS: BTreeSet<String> = BTreeSet::new();

/// A named node carrying its dependency edge sets.
///
/// Build worktrees, doc worktrees and toolchain packages all implement this
/// so they can be handed to [`crate::deps::DepsSolver`] directly. The solver
/// only reads the sets at query time and never keeps them around.
pub trait DependencyNode {
    fn name(&self) -> &str;
    fn build_depends(&self) -> &BTreeSet<String>;
    fn run_depends(&self) -> &BTreeSet<String>;
    fn test_depends(&self) -> &BTreeSet<String>;

    /// Tools that must run on the host when cross-compiling.
    fn host_depends(&self) -> &BTreeSet<String> {
        &NO_DEPS
    }

    fn depends(&self, dep_type: DepType) -> &BTreeSet<String> {
        match dep_type {
            DepType::Build => self.build_depends(),
            DepType::Run => self.run_depends(),
            DepType::Test => self.test_depends(),
        }
    }

    /// Union of the edge sets selected by `dep_types`, in lexicographic order.
    fn depends_for(&self, dep_types: &[DepType]) -> BTreeSet<String> {
        let mut deps = BTreeSet::new();
        for dep_type in dep_types {
            deps.extend(self.depends(*dep_type).iter().cloned());
        }
        deps
    }
}

/// Plain project description, as read from a worktree manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub build_depends: BTreeSet<String>,
    #[serde(default, alias = "runtime_depends")]
    pub run_depends: BTreeSet<String>,
    #[serde(default)]
    pub test_depends: BTreeSet<String>,
    #[serde(default)]
    pub host_depends: BTreeSet<String>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl DependencyNode for Project {
    fn name(&self) -> &str {
        &self.name
    }

    fn build_depends(&self) -> &BTreeSet<String> {
        &self.build_depends
    }

    fn run_depends(&self) -> &BTreeSet<String> {
        &self.run_depends
    }

    fn test_depends(&self) -> &BTreeSet<String> {
        &self.test_depends
    }

    fn host_depends(&self) -> &BTreeSet<String> {
        &self.host_depends
    }
}
