// src/deps/mod.rs

//! Dependency resolution and build ordering.
//!
//! - [`node`] defines what a project must expose (its name and edge sets).
//! - [`sort`] holds the depth-first topological sort and DAG check.
//! - [`solver`] answers the queries builders need: ordered closures,
//!   reverse dependents, host tools.

pub mod node;
pub mod solver;
pub mod sort;

pub use node::{DependencyNode, Project};
pub use solver::{gen_deps, DepsSolver};
pub use sort::{assert_dag, topological_sort, DependencyGraph};
