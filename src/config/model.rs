// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::deps::Project;

/// Worktree manifest as read from a TOML file, before validation.
///
/// ```toml
/// [project.naoqi]
/// build_depends = ["qt-pc", "toolchain"]
/// run_depends = ["python-pc"]
/// test_depends = ["gtest"]
/// host_depends = ["protoc"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawWorktreeFile {
    /// All projects from `[project.<name>]`, keyed by project name.
    #[serde(default)]
    pub project: BTreeMap<String, ProjectConfig>,
}

/// `[project.<name>]` section.
///
/// Names listed here do not have to be projects of the worktree: they may
/// refer to toolchain packages, which the solver treats as leaves.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub build_depends: Vec<String>,

    #[serde(default, alias = "runtime_depends")]
    pub run_depends: Vec<String>,

    #[serde(default)]
    pub test_depends: Vec<String>,

    /// Tools needed on the host when cross-compiling.
    #[serde(default)]
    pub host_depends: Vec<String>,
}

impl ProjectConfig {
    pub fn to_project(&self, name: &str) -> Project {
        Project {
            name: name.to_string(),
            build_depends: self.build_depends.iter().cloned().collect(),
            run_depends: self.run_depends.iter().cloned().collect(),
            test_depends: self.test_depends.iter().cloned().collect(),
            host_depends: self.host_depends.iter().cloned().collect(),
        }
    }
}

/// Validated worktree: the projects the solver works on.
///
/// Only obtainable through `TryFrom<RawWorktreeFile>`.
#[derive(Debug, Clone)]
pub struct WorktreeFile {
    projects: Vec<Project>,
}

impl WorktreeFile {
    pub(crate) fn new_unchecked(raw: RawWorktreeFile) -> Self {
        let projects = raw
            .project
            .iter()
            .map(|(name, cfg)| cfg.to_project(name))
            .collect();
        Self { projects }
    }

    /// Projects sorted by name.
    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn project(&self, name: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.projects.iter().map(|p| p.name.as_str())
    }
}
