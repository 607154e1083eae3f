// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::types::{ColorChoice, DepType};

/// Command-line arguments for `qitree`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "qitree",
    version,
    about = "Order project dependencies and run test suites.",
    long_about = None
)]
pub struct CliArgs {
    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `QITREE_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Color the output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the dependencies of projects, in build order.
    Deps(DepsArgs),
    /// Run the tests described in a qitest.json file.
    Test(TestArgs),
    /// Add a test to a qitest.json file.
    AddTest(AddTestArgs),
}

#[derive(Debug, Clone, Args)]
pub struct DepsArgs {
    /// Worktree manifest (TOML).
    #[arg(long, value_name = "PATH", default_value = "qiworktree.toml")]
    pub worktree: PathBuf,

    /// Dependency kinds to follow.
    #[arg(long, value_delimiter = ',', default_values_t = vec![DepType::Build, DepType::Run])]
    pub dep_types: Vec<DepType>,

    /// Fail on dependency cycles instead of breaking them.
    #[arg(long)]
    pub strict: bool,

    /// Print the projects depending on the given ones instead.
    #[arg(long)]
    pub reverse: bool,

    /// With --reverse, follow dependents of dependents too.
    #[arg(long, requires = "reverse")]
    pub transitive: bool,

    /// Print the host dependencies of the closure.
    #[arg(long, conflicts_with = "reverse")]
    pub host: bool,

    #[arg(required = true, value_name = "PROJECT")]
    pub projects: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct TestArgs {
    /// Test list (JSON).
    #[arg(long, value_name = "PATH", default_value = "qitest.json")]
    pub conf: PathBuf,

    /// Number of tests to run in parallel.
    #[arg(short = 'j', long = "jobs", default_value_t = 1)]
    pub num_jobs: usize,

    /// Only run tests whose name matches one of these regexes.
    #[arg(short = 'k', long = "pattern", value_name = "REGEX")]
    pub patterns: Vec<String>,

    /// Skip tests whose name matches one of these regexes.
    #[arg(short = 'x', long = "exclude", value_name = "REGEX")]
    pub excludes: Vec<String>,

    /// Run the performance tests instead.
    #[arg(long)]
    pub perf: bool,

    /// Run the nightly tests instead.
    #[arg(long)]
    pub nightly: bool,

    /// Run the tests under valgrind.
    #[arg(long)]
    pub valgrind: bool,

    /// Pin each test to this many CPUs.
    #[arg(long = "ncpu", value_name = "N")]
    pub num_cpus: Option<usize>,

    /// Shuffle and repeat gtest tests.
    #[arg(long)]
    pub nightmare: bool,

    /// Break on the first gtest failure.
    #[arg(long)]
    pub break_on_failure: bool,

    #[arg(long)]
    pub ignore_timeouts: bool,

    /// Let test output through instead of capturing it.
    #[arg(long)]
    pub no_capture: bool,

    /// Print the output of passing tests too.
    #[arg(short, long)]
    pub verbose: bool,

    /// Run the suite up to N times, stopping at the first failure.
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub repeat_until_fail: usize,

    /// Only run the tests that failed last time.
    #[arg(long, requires = "results_dir")]
    pub last_failed: bool,

    /// Where to store test results and the list of failed tests.
    #[arg(long, value_name = "DIR")]
    pub results_dir: Option<PathBuf>,

    /// Working directory for the tests.
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct AddTestArgs {
    /// Test list (JSON), created if missing.
    #[arg(long, value_name = "PATH", default_value = "qitest.json")]
    pub conf: PathBuf,

    #[arg(long)]
    pub name: String,

    /// Timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    #[arg(long)]
    pub gtest: bool,

    #[arg(long)]
    pub pytest: bool,

    #[arg(long)]
    pub perf: bool,

    #[arg(long)]
    pub nightly: bool,

    #[arg(long, value_name = "DIR")]
    pub working_directory: Option<PathBuf>,

    /// Environment variable for the test.
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub environment: Vec<(String, String)>,

    /// Command to run, after `--`.
    #[arg(last = true, required = true, value_name = "CMD")]
    pub cmd: Vec<String>,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_parse() {
        let args = CliArgs::try_parse_from([
            "qitree", "test", "-j", "4", "-k", "foo", "-k", "bar", "--ncpu", "2",
        ])
        .unwrap();
        let Command::Test(test) = args.command else {
            panic!("expected test subcommand");
        };
        assert_eq!(test.num_jobs, 4);
        assert_eq!(test.patterns, vec!["foo", "bar"]);
        assert_eq!(test.num_cpus, Some(2));
    }

    #[test]
    fn deps_default_to_build_and_run() {
        let args = CliArgs::try_parse_from(["qitree", "deps", "naoqi"]).unwrap();
        let Command::Deps(deps) = args.command else {
            panic!("expected deps subcommand");
        };
        assert_eq!(deps.dep_types, vec![DepType::Build, DepType::Run]);
    }

    #[test]
    fn add_test_takes_command_after_separator() {
        let args = CliArgs::try_parse_from([
            "qitree", "add-test", "--name", "foo", "--env", "A=1", "--", "bin/foo", "--bar",
        ])
        .unwrap();
        let Command::AddTest(add) = args.command else {
            panic!("expected add-test subcommand");
        };
        assert_eq!(add.cmd, vec!["bin/foo", "--bar"]);
        assert_eq!(add.environment, vec![("A".to_string(), "1".to_string())]);
    }

    #[test]
    fn key_value_requires_equal_sign() {
        assert!(parse_key_value("nope").is_err());
        assert_eq!(
            parse_key_value("A=b=c"),
            Ok(("A".to_string(), "b=c".to_string()))
        );
    }
}
