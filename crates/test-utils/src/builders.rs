#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use qitree::config::{ProjectConfig, RawWorktreeFile, WorktreeFile};
use qitree::deps::Project;
use qitree::qitest::TestDescriptor;

/// Builder for `WorktreeFile` to simplify test setup.
pub struct WorktreeBuilder {
    raw: RawWorktreeFile,
}

impl WorktreeBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawWorktreeFile::default(),
        }
    }

    pub fn with_project(mut self, name: &str, project: ProjectConfig) -> Self {
        self.raw.project.insert(name.to_string(), project);
        self
    }

    pub fn raw(self) -> RawWorktreeFile {
        self.raw
    }

    pub fn build(self) -> WorktreeFile {
        WorktreeFile::try_from(self.raw).expect("Failed to build valid worktree from builder")
    }
}

impl Default for WorktreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for one project, usable both as a manifest section and as a
/// solver node.
#[derive(Default)]
pub struct ProjectBuilder {
    config: ProjectConfig,
}

impl ProjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build_dep(mut self, dep: &str) -> Self {
        self.config.build_depends.push(dep.to_string());
        self
    }

    pub fn run_dep(mut self, dep: &str) -> Self {
        self.config.run_depends.push(dep.to_string());
        self
    }

    pub fn test_dep(mut self, dep: &str) -> Self {
        self.config.test_depends.push(dep.to_string());
        self
    }

    pub fn host_dep(mut self, dep: &str) -> Self {
        self.config.host_depends.push(dep.to_string());
        self
    }

    pub fn config(self) -> ProjectConfig {
        self.config
    }

    pub fn named(self, name: &str) -> Project {
        self.config.to_project(name)
    }
}

/// Builder for `TestDescriptor`.
pub struct TestDescriptorBuilder {
    test: TestDescriptor,
}

impl TestDescriptorBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            test: TestDescriptor::new(name, [format!("/usr/bin/{name}")]),
        }
    }

    pub fn cmd(mut self, cmd: &[&str]) -> Self {
        self.test.cmd = cmd.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn timeout(mut self, secs: u64) -> Self {
        self.test.timeout = Some(secs);
        self
    }

    pub fn working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.test.working_directory = Some(dir.into());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.test.environment.insert(key.to_string(), value.to_string());
        self
    }

    pub fn environment(mut self, env: BTreeMap<String, String>) -> Self {
        self.test.environment = env;
        self
    }

    pub fn gtest(mut self) -> Self {
        self.test.gtest = true;
        self
    }

    pub fn perf(mut self) -> Self {
        self.test.perf = true;
        self
    }

    pub fn nightly(mut self) -> Self {
        self.test.nightly = true;
        self
    }

    pub fn build(self) -> TestDescriptor {
        self.test
    }
}

/// Tests named after `names`, with default settings.
pub fn tests_named(names: &[&str]) -> Vec<TestDescriptor> {
    names
        .iter()
        .map(|name| TestDescriptorBuilder::new(name).build())
        .collect()
}
