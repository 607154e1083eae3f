// src/types.rs

use std::fmt;
use std::io::IsTerminal;
use std::str::FromStr;

use clap::ValueEnum;
use serde::Deserialize;

/// Kind of dependency edge between two projects.
///
/// A query selects a subset of these kinds; a project's effective
/// dependency set is the union of the matching edge sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepType {
    Build,
    #[serde(alias = "runtime")]
    Run,
    Test,
}

impl DepType {
    pub const ALL: [DepType; 3] = [DepType::Build, DepType::Run, DepType::Test];
}

impl fmt::Display for DepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DepType::Build => "build",
            DepType::Run => "run",
            DepType::Test => "test",
        };
        f.write_str(s)
    }
}

impl FromStr for DepType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "build" | "buildtime" => Ok(DepType::Build),
            "run" | "runtime" => Ok(DepType::Run),
            "test" | "testtime" => Ok(DepType::Test),
            other => Err(format!(
                "invalid dependency type: {other} (expected \"build\", \"run\" or \"test\")"
            )),
        }
    }
}

/// What the topological sort does when it walks into a cycle.
///
/// - `Break`: cut the cycle at the second encounter and keep going. The
///   sort then always finds an order, even when the data is not a DAG.
/// - `Error`: fail with a [`crate::errors::CycleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePolicy {
    #[default]
    Break,
    Error,
}

impl FromStr for CyclePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "break" => Ok(CyclePolicy::Break),
            "error" => Ok(CyclePolicy::Error),
            other => Err(format!(
                "invalid cycle policy: {other} (expected \"break\" or \"error\")"
            )),
        }
    }
}

/// When to color console output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Only when STDOUT is a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    pub fn enabled(self) -> bool {
        match self {
            ColorChoice::Auto => std::io::stdout().is_terminal(),
            ColorChoice::Always => true,
            ColorChoice::Never => false,
        }
    }
}
