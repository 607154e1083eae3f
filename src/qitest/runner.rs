// src/qitest/runner.rs

//! Test suite runner: option validation, selection and the results
//! directory around a [`TestQueue`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::errors::{QitreeError, Result};
use crate::output::OutputSink;
use crate::qitest::conf::{TestDescriptor, parse_tests};
use crate::qitest::filter::TestFilter;
use crate::qitest::launcher::{DEFAULT_KILL_GRACE, ProcessLauncher, TestLauncher};
use crate::qitest::prepare::{Enrichment, available_cpus};
use crate::qitest::queue::{InterruptHandle, TestQueue};
use crate::qitest::report::{RunStatus, TestReport};

/// Name of the file listing the tests that failed in the previous run.
pub const FAILED_TESTS_FILE: &str = ".failed.json";

/// Everything that can be tuned on a test run.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// 0 or 1 runs the tests sequentially.
    pub num_jobs: usize,
    pub patterns: Vec<String>,
    pub excludes: Vec<String>,
    pub perf: bool,
    pub nightly: bool,
    /// Defaults to the current directory.
    pub cwd: Option<PathBuf>,
    /// Base environment. Defaults to the environment of this process.
    pub env: Option<BTreeMap<String, String>>,
    pub valgrind: bool,
    /// Pin each test to this many CPUs with `taskset`.
    pub num_cpus: Option<usize>,
    pub nightmare: bool,
    pub break_on_failure: bool,
    pub ignore_timeouts: bool,
    pub capture: bool,
    pub verbose: bool,
    pub color: bool,
    /// Run the suite up to this many times, stopping at the first failure.
    /// 0 runs it once.
    pub repeat_until_fail: usize,
    /// Only run the tests that failed last time.
    pub last_failed: bool,
    /// Where test results, perf results and the failed tests list go.
    pub results_dir: Option<PathBuf>,
    pub kill_grace: Duration,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            num_jobs: 1,
            patterns: Vec::new(),
            excludes: Vec::new(),
            perf: false,
            nightly: false,
            cwd: None,
            env: None,
            valgrind: false,
            num_cpus: None,
            nightmare: false,
            break_on_failure: false,
            ignore_timeouts: false,
            capture: true,
            verbose: false,
            color: false,
            repeat_until_fail: 0,
            last_failed: false,
            results_dir: None,
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }
}

/// Validated test run, ready to go.
///
/// Every configuration problem (bad pattern, missing tool, ...) is reported
/// by [`TestSuiteRunner::new`], before any test starts.
pub struct TestSuiteRunner<L> {
    num_configured: usize,
    selected: Vec<TestDescriptor>,
    options: RunnerOptions,
    launcher: Arc<L>,
    enrichment: Enrichment,
    sink: Arc<dyn OutputSink>,
    interrupt: InterruptHandle,
}

impl TestSuiteRunner<ProcessLauncher> {
    /// Runner spawning real processes.
    pub fn with_process_launcher(
        tests: Vec<TestDescriptor>,
        options: RunnerOptions,
        sink: Arc<dyn OutputSink>,
    ) -> Result<Self> {
        let launcher = ProcessLauncher {
            capture: options.capture,
            kill_grace: options.kill_grace,
        };
        Self::new(tests, options, launcher, sink)
    }

    /// Same as [`Self::with_process_launcher`], reading the tests from a
    /// `qitest.json` file.
    pub fn from_conf(
        path: impl AsRef<Path>,
        options: RunnerOptions,
        sink: Arc<dyn OutputSink>,
    ) -> Result<Self> {
        let tests = parse_tests(path)?;
        Self::with_process_launcher(tests, options, sink)
    }
}

impl<L> TestSuiteRunner<L>
where
    L: TestLauncher + 'static,
{
    pub fn new(
        tests: Vec<TestDescriptor>,
        options: RunnerOptions,
        launcher: L,
        sink: Arc<dyn OutputSink>,
    ) -> Result<Self> {
        let mut filter = TestFilter::new(
            &options.patterns,
            &options.excludes,
            options.perf,
            options.nightly,
        )?;

        let cwd = match &options.cwd {
            Some(cwd) => cwd.clone(),
            None => std::env::current_dir()?,
        };
        let base_env: BTreeMap<String, String> = match &options.env {
            Some(env) => env.clone(),
            None => std::env::vars().collect(),
        };
        let path_env = base_env.get("PATH").map(String::as_str);

        let valgrind = if options.valgrind {
            Some(find_tool("valgrind", path_env, &cwd)?)
        } else {
            None
        };
        let taskset = match options.num_cpus {
            Some(0) => {
                return Err(QitreeError::ConfigError(
                    "number of cpus per test must be at least 1".to_string(),
                ));
            }
            Some(n) => Some((find_tool("taskset", path_env, &cwd)?, n)),
            None => None,
        };

        if options.last_failed {
            let Some(dir) = &options.results_dir else {
                return Err(QitreeError::ConfigError(
                    "running the last failed tests requires a results directory".to_string(),
                ));
            };
            filter = filter.only(read_failed_tests(dir)?);
        }

        let (test_results_dir, perf_results_dir) = match &options.results_dir {
            Some(dir) => {
                let test_dir = dir.join("test-results");
                let perf_dir = dir.join("perf-results");
                fs::create_dir_all(&test_dir)?;
                fs::create_dir_all(&perf_dir)?;
                (Some(test_dir), Some(perf_dir))
            }
            None => (None, None),
        };

        let enrichment = Enrichment {
            cwd,
            base_env,
            color: options.color,
            valgrind,
            taskset,
            total_cpus: available_cpus(),
            nightmare: options.nightmare,
            break_on_failure: options.break_on_failure,
            ignore_timeouts: options.ignore_timeouts,
            test_results_dir,
            perf_results_dir,
        };

        let selected = filter.select(&tests);
        debug!(configured = tests.len(), selected = selected.len(), "selected tests");

        Ok(Self {
            num_configured: tests.len(),
            selected,
            options,
            launcher: Arc::new(launcher),
            enrichment,
            sink,
            interrupt: InterruptHandle::new(),
        })
    }

    /// Tests that will run, in order.
    pub fn selected_tests(&self) -> &[TestDescriptor] {
        &self.selected
    }

    /// Handle to cancel the run from another task (Ctrl-C).
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    pub async fn run(&self) -> Result<TestReport> {
        if self.num_configured == 0 {
            let report = TestReport::empty(RunStatus::NoTestsConfigured);
            report.print_summary(self.sink.as_ref());
            return Ok(report);
        }

        info!(
            tests = self.selected.len(),
            jobs = self.options.num_jobs,
            "running test suite"
        );
        let queue = TestQueue::new(
            self.selected.clone(),
            self.launcher.clone(),
            self.enrichment.clone(),
            self.sink.clone(),
        )
        .with_interrupt(self.interrupt.clone())
        .verbose(self.options.verbose);

        let report = queue
            .run_until_fail(self.options.num_jobs, self.options.repeat_until_fail)
            .await?;

        if report.status == RunStatus::Completed {
            if let Some(dir) = &self.options.results_dir {
                write_failed_tests(dir, &report.failed_names())?;
            }
        }
        Ok(report)
    }
}

fn find_tool(name: &str, path_env: Option<&str>, cwd: &Path) -> Result<PathBuf> {
    which::which_in(name, path_env, cwd)
        .map_err(|_| QitreeError::ConfigError(format!("{name} was not found on the system")))
}

/// Names stored by the previous run. No file means nothing failed.
pub fn read_failed_tests(results_dir: &Path) -> Result<Vec<String>> {
    let path = results_dir.join(FAILED_TESTS_FILE);
    if !path.exists() {
        warn!(path = %path.display(), "no failed tests recorded");
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&contents)?)
}

pub fn write_failed_tests(results_dir: &Path, names: &[String]) -> Result<()> {
    fs::create_dir_all(results_dir)?;
    let path = results_dir.join(FAILED_TESTS_FILE);
    fs::write(&path, serde_json::to_string(names)?)?;
    debug!(path = %path.display(), failed = names.len(), "wrote failed tests");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_tests_round_trip_through_results_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_failed_tests(dir.path()).unwrap().is_empty());

        write_failed_tests(dir.path(), &["b".to_string(), "a".to_string()]).unwrap();
        assert_eq!(read_failed_tests(dir.path()).unwrap(), vec!["b", "a"]);
    }
}
