// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::warn;

use crate::config::model::{RawWorktreeFile, WorktreeFile};
use crate::errors::{QitreeError, Result};

impl TryFrom<RawWorktreeFile> for WorktreeFile {
    type Error = QitreeError;

    fn try_from(raw: RawWorktreeFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_worktree(&raw)?;
        warn_on_cycles(&raw);
        Ok(WorktreeFile::new_unchecked(raw))
    }
}

fn validate_raw_worktree(raw: &RawWorktreeFile) -> Result<()> {
    ensure_has_projects(raw)?;
    validate_names(raw)?;
    validate_no_self_dependency(raw)?;
    Ok(())
}

fn ensure_has_projects(raw: &RawWorktreeFile) -> Result<()> {
    if raw.project.is_empty() {
        return Err(QitreeError::ConfigError(
            "worktree must contain at least one [project.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_names(raw: &RawWorktreeFile) -> Result<()> {
    for (name, project) in raw.project.iter() {
        if name.trim().is_empty() {
            return Err(QitreeError::ConfigError(
                "project names cannot be empty".to_string(),
            ));
        }
        let deps = project
            .build_depends
            .iter()
            .chain(project.run_depends.iter())
            .chain(project.test_depends.iter())
            .chain(project.host_depends.iter());
        for dep in deps {
            if dep.trim().is_empty() {
                return Err(QitreeError::ConfigError(format!(
                    "project '{name}' has an empty dependency name"
                )));
            }
        }
    }
    Ok(())
}

fn validate_no_self_dependency(raw: &RawWorktreeFile) -> Result<()> {
    for (name, project) in raw.project.iter() {
        let kinds = [
            ("build_depends", &project.build_depends),
            ("run_depends", &project.run_depends),
            ("test_depends", &project.test_depends),
            ("host_depends", &project.host_depends),
        ];
        for (field, deps) in kinds {
            if deps.iter().any(|dep| dep == name) {
                return Err(QitreeError::ConfigError(format!(
                    "project '{name}' cannot depend on itself in `{field}`"
                )));
            }
        }
    }
    Ok(())
}

fn warn_on_cycles(raw: &RawWorktreeFile) {
    // Edge direction: dep -> project.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for (name, project) in raw.project.iter() {
        graph.add_node(name.as_str());
        let deps = project
            .build_depends
            .iter()
            .chain(project.run_depends.iter())
            .chain(project.test_depends.iter());
        for dep in deps {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    if let Err(cycle) = toposort(&graph, None) {
        warn!(
            project = cycle.node_id(),
            "worktree dependencies contain a cycle; strict queries will fail"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::ProjectConfig;

    fn raw(entries: &[(&str, &[&str])]) -> RawWorktreeFile {
        let mut raw = RawWorktreeFile::default();
        for (name, deps) in entries {
            raw.project.insert(
                name.to_string(),
                ProjectConfig {
                    build_depends: deps.iter().map(|d| d.to_string()).collect(),
                    ..ProjectConfig::default()
                },
            );
        }
        raw
    }

    #[test]
    fn empty_worktree_is_rejected() {
        let err = WorktreeFile::try_from(RawWorktreeFile::default()).unwrap_err();
        assert!(err.to_string().contains("at least one"));
    }

    #[test]
    fn self_dependency_is_rejected() {
        let err = WorktreeFile::try_from(raw(&[("a", &["a"])])).unwrap_err();
        match err {
            QitreeError::ConfigError(msg) => assert!(msg.contains("cannot depend on itself")),
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn cycles_and_unknown_names_are_accepted() {
        let wt = WorktreeFile::try_from(raw(&[("a", &["b"]), ("b", &["a", "boost"])])).unwrap();
        assert_eq!(wt.names().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
