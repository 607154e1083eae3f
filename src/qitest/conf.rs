// src/qitest/conf.rs

//! The `qitest.json` test list: a JSON array of test descriptors.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{QitreeError, Result};

/// Static definition of one test to run.
///
/// Descriptors are shared by every run and never modified: the runner
/// derives an enriched working copy for each launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestDescriptor {
    /// Unique name, used as the key of the results.
    pub name: String,

    /// Program and arguments.
    pub cmd: Vec<String>,

    /// Timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,

    /// Variables set on top of the runner environment.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub gtest: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub pytest: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub perf: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub nightly: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl TestDescriptor {
    pub fn new<I, S>(name: impl Into<String>, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            cmd: cmd.into_iter().map(Into::into).collect(),
            timeout: None,
            working_directory: None,
            environment: BTreeMap::new(),
            gtest: false,
            pytest: false,
            perf: false,
            nightly: false,
        }
    }
}

/// Parse the tests described in a `qitest.json` file.
pub fn parse_tests(path: impl AsRef<Path>) -> Result<Vec<TestDescriptor>> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let tests: Vec<TestDescriptor> = serde_json::from_str(&contents)?;
    debug!(path = %path.display(), count = tests.len(), "parsed test list");
    Ok(tests)
}

/// Write a list of tests, optionally after the ones already in the file.
pub fn write_tests(tests: &[TestDescriptor], path: impl AsRef<Path>, append: bool) -> Result<()> {
    let path = path.as_ref();
    let mut all = if append && path.exists() {
        parse_tests(path)?
    } else {
        Vec::new()
    };
    all.extend_from_slice(tests);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(&all)?;
    fs::write(path, json)?;
    Ok(())
}

/// Append one test to a `qitest.json` file, creating it if needed.
///
/// The file is left untouched when the test is invalid or when a test with
/// the same name is already there.
pub fn add_test(path: impl AsRef<Path>, test: TestDescriptor) -> Result<()> {
    let path = path.as_ref();
    if test.name.trim().is_empty() {
        return Err(QitreeError::ConfigError(
            "Should provide a test name".to_string(),
        ));
    }
    if test.cmd.is_empty() {
        return Err(QitreeError::ConfigError(format!(
            "Should provide a test cmd (test '{}')",
            test.name
        )));
    }

    let mut tests = if path.exists() {
        parse_tests(path)?
    } else {
        Vec::new()
    };

    if let Some(existing) = tests.iter().find(|t| t.name == test.name) {
        return Err(QitreeError::ConfigError(format!(
            "A test named '{}' already exists. (cmd={:?})",
            existing.name, existing.cmd
        )));
    }

    tests.push(test);
    write_tests(&tests, path, false)
}

/// Make absolute paths under `sdk_dir` relative to it, so the tests can be
/// moved along with the sdk. Paths elsewhere are kept as they are.
pub fn relocate_cmd(sdk_dir: &Path, cmd: &[String]) -> Vec<String> {
    cmd.iter()
        .map(|arg| {
            let path = Path::new(arg);
            if !path.is_absolute() {
                return arg.clone();
            }
            match path.strip_prefix(sdk_dir) {
                Ok(rel) => rel.to_string_lossy().into_owned(),
                Err(_) => arg.clone(),
            }
        })
        .collect()
}

pub fn relocate_tests(sdk_dir: &Path, tests: &[TestDescriptor]) -> Vec<TestDescriptor> {
    tests
        .iter()
        .map(|test| TestDescriptor {
            cmd: relocate_cmd(sdk_dir, &test.cmd),
            ..test.clone()
        })
        .collect()
}
