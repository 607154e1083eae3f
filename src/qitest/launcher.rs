// src/qitest/launcher.rs

//! Pluggable test launcher.
//!
//! The queue hands prepared tests to a [`TestLauncher`] instead of spawning
//! processes itself, so tests can swap in a fake launcher that never starts
//! a process.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tracing::debug;

use crate::qitest::prepare::PreparedTest;
use crate::qitest::process::{ProcessSpec, run_process};
use crate::qitest::result::TestResult;
use crate::qitest::valgrind::apply_valgrind_log;

/// Default delay between asking a timed out test to stop and killing it.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// Runs one prepared test and classifies how it ended.
///
/// Returning `Err` means the harness itself failed: the queue records an
/// infrastructure error for the test and the whole suite reports it.
pub trait TestLauncher: Send + Sync {
    fn launch<'a>(
        &'a self,
        test: &'a PreparedTest,
        interrupt: watch::Receiver<bool>,
    ) -> Pin<Box<dyn Future<Output = Result<TestResult>> + Send + 'a>>;
}

/// Launcher spawning real processes.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    pub capture: bool,
    pub kill_grace: Duration,
}

impl Default for ProcessLauncher {
    fn default() -> Self {
        Self {
            capture: true,
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }
}

impl TestLauncher for ProcessLauncher {
    fn launch<'a>(
        &'a self,
        test: &'a PreparedTest,
        mut interrupt: watch::Receiver<bool>,
    ) -> Pin<Box<dyn Future<Output = Result<TestResult>> + Send + 'a>> {
        Box::pin(async move {
            let spec = ProcessSpec {
                cmd: test.cmd.clone(),
                cwd: test.cwd.clone(),
                env: test.env.clone(),
                timeout: test.timeout,
                capture: self.capture,
                kill_grace: self.kill_grace,
            };
            let run = run_process(&spec, &mut interrupt).await?;
            debug!(test = %test.name, outcome = ?run.outcome, elapsed = ?run.elapsed, "test process finished");

            let mut result =
                TestResult::from_outcome(&test.name, run.outcome, test.timeout, run.elapsed, run.output);
            if let Some(log) = &test.valgrind_log {
                apply_valgrind_log(&mut result, log);
            }
            Ok(result)
        })
    }
}
