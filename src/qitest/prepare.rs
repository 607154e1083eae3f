// src/qitest/prepare.rs

//! Turning a shared test descriptor into the concrete command to launch.
//!
//! The descriptor is never modified: every launch gets its own
//! [`PreparedTest`], so repeated runs start from the same data.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::{QitreeError, Result};
use crate::qitest::conf::TestDescriptor;

/// Timeout applied to tests that do not declare one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Suite-wide settings applied to every test before launch.
///
/// Tool paths are resolved once by the runner, so a missing tool is
/// reported before any test starts.
#[derive(Debug, Clone)]
pub struct Enrichment {
    /// Default working directory, and base for relative executables.
    pub cwd: PathBuf,
    /// Environment every test starts from.
    pub base_env: BTreeMap<String, String>,
    /// Ask gtest for colored output.
    pub color: bool,
    /// Path to `valgrind` when running under valgrind.
    pub valgrind: Option<PathBuf>,
    /// Path to `taskset` and the number of CPUs given to each test.
    pub taskset: Option<(PathBuf, usize)>,
    pub total_cpus: usize,
    /// Shuffle and repeat gtest tests.
    pub nightmare: bool,
    pub break_on_failure: bool,
    pub ignore_timeouts: bool,
    /// Where gtest/pytest XML results and valgrind logs go.
    pub test_results_dir: Option<PathBuf>,
    pub perf_results_dir: Option<PathBuf>,
}

impl Enrichment {
    /// Plain settings: given cwd, current process environment, no wrapping.
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            base_env: std::env::vars().collect(),
            color: false,
            valgrind: None,
            taskset: None,
            total_cpus: available_cpus(),
            nightmare: false,
            break_on_failure: false,
            ignore_timeouts: false,
            test_results_dir: None,
            perf_results_dir: None,
        }
    }
}

pub fn available_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Working copy of a descriptor, ready to be launched.
#[derive(Debug, Clone)]
pub struct PreparedTest {
    pub name: String,
    pub cmd: Vec<String>,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
    /// `None` when timeouts are ignored.
    pub timeout: Option<Duration>,
    /// Log to inspect after the run when wrapped with valgrind.
    pub valgrind_log: Option<PathBuf>,
    pub descriptor: TestDescriptor,
}

/// Build the working copy of `test` for the worker `worker_index`.
pub fn prepare(
    test: &TestDescriptor,
    enrichment: &Enrichment,
    worker_index: usize,
) -> Result<PreparedTest> {
    if test.cmd.is_empty() {
        return Err(QitreeError::ConfigError(format!(
            "test '{}' has an empty cmd",
            test.name
        )));
    }

    let mut cmd = test.cmd.clone();
    let mut timeout_secs = test.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS);

    add_output_args(test, enrichment, &mut cmd);

    let cwd = match &test.working_directory {
        Some(dir) if dir.is_absolute() => dir.clone(),
        Some(dir) => enrichment.cwd.join(dir),
        None => enrichment.cwd.clone(),
    };

    let mut env = enrichment.base_env.clone();
    env.extend(test.environment.iter().map(|(k, v)| (k.clone(), v.clone())));
    if enrichment.color && test.gtest {
        env.insert("GTEST_COLOR".to_string(), "yes".to_string());
    }
    timeout_secs = timeout_secs.saturating_mul(gtest_repeat(&env, &test.name));

    cmd[0] = resolve_executable(&cmd[0], &enrichment.cwd, env.get("PATH").map(String::as_str))
        .to_string_lossy()
        .into_owned();

    let mut valgrind_log = None;
    if let Some(valgrind) = &enrichment.valgrind {
        let log = results_dir(enrichment).join(format!("{}_valgrind.log", test.name));
        timeout_secs = timeout_secs.saturating_mul(10);
        let mut wrapped = vec![
            valgrind.to_string_lossy().into_owned(),
            "--track-fds=yes".to_string(),
            format!("--log-file={}", log.display()),
        ];
        wrapped.append(&mut cmd);
        cmd = wrapped;
        valgrind_log = Some(log);
    }

    if enrichment.nightmare && test.gtest {
        cmd.push("--gtest_shuffle".to_string());
        cmd.push("--gtest_repeat=20".to_string());
        timeout_secs = timeout_secs.saturating_mul(20);
    }

    if let Some((taskset, num_cpus)) = &enrichment.taskset {
        let cpus = cpu_list(enrichment.total_cpus, *num_cpus, worker_index)
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let mut wrapped = vec![taskset.to_string_lossy().into_owned(), "-c".to_string(), cpus];
        wrapped.append(&mut cmd);
        cmd = wrapped;
    }

    let timeout = if enrichment.ignore_timeouts {
        None
    } else {
        Some(Duration::from_secs(timeout_secs))
    };

    debug!(test = %test.name, ?cmd, cwd = %cwd.display(), ?timeout, "prepared test");

    Ok(PreparedTest {
        name: test.name.clone(),
        cmd,
        cwd,
        env,
        timeout,
        valgrind_log,
        descriptor: test.clone(),
    })
}

fn results_dir(enrichment: &Enrichment) -> PathBuf {
    enrichment
        .test_results_dir
        .clone()
        .unwrap_or_else(|| enrichment.cwd.clone())
}

/// Ask the test frameworks to write their XML results next to each other.
fn add_output_args(test: &TestDescriptor, enrichment: &Enrichment, cmd: &mut Vec<String>) {
    if let Some(dir) = &enrichment.test_results_dir {
        let out = dir.join(format!("{}.xml", test.name));
        if test.gtest {
            cmd.push(format!("--gtest_output=xml:{}", out.display()));
            if enrichment.break_on_failure {
                cmd.push("--gtest_break_on_failure".to_string());
            }
        }
        if test.pytest {
            cmd.push("--junit-xml".to_string());
            cmd.push(out.display().to_string());
        }
    }
    if test.perf {
        if let Some(dir) = &enrichment.perf_results_dir {
            cmd.push("--output".to_string());
            cmd.push(dir.join(format!("{}.xml", test.name)).display().to_string());
        }
    }
}

fn gtest_repeat(env: &BTreeMap<String, String>, test: &str) -> u64 {
    match env.get("GTEST_REPEAT") {
        None => 1,
        Some(value) => match value.trim().parse::<u64>() {
            Ok(n) if n > 0 => n,
            _ => {
                warn!(test, value = %value, "ignoring invalid GTEST_REPEAT value");
                1
            }
        },
    }
}

/// Absolute paths are kept. A bare program name is taken from `cwd` when it
/// exists there, otherwise looked up on `PATH`. Anything else is relative to
/// `cwd`.
pub fn resolve_executable(program: &str, cwd: &Path, path_env: Option<&str>) -> PathBuf {
    let path = Path::new(program);
    if path.is_absolute() {
        return path.to_path_buf();
    }

    let in_cwd = cwd.join(path);
    if in_cwd.exists() || path.components().count() > 1 {
        return in_cwd;
    }

    match which::which_in(program, path_env, cwd) {
        Ok(found) => found,
        Err(_) => in_cwd,
    }
}

/// CPUs assigned to the test run by worker `worker_index`, wrapping around
/// when there are more workers than CPUs.
pub fn cpu_list(total_cpus: usize, num_cpus_per_test: usize, worker_index: usize) -> Vec<usize> {
    let total = total_cpus.max(1);
    let start = worker_index * num_cpus_per_test;
    (start..start + num_cpus_per_test)
        .map(|cpu| cpu % total)
        .collect()
}
