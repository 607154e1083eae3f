// src/qitest/report.rs

//! Aggregated results of one queue run.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::output::{OutputSink, Style};
use crate::qitest::logger::counter;
use crate::qitest::result::TestResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Tests were selected and run (possibly interrupted).
    Completed,
    /// The test list is empty. Trivially ok.
    NoTestsConfigured,
    /// Tests exist but the filters selected none. Not ok.
    NoTestsMatched,
}

/// Results of one run, keyed by test name.
///
/// Everything user-visible iterates `tests` (the filtered order), never the
/// completion order of the workers.
#[derive(Debug, Clone)]
pub struct TestReport {
    pub status: RunStatus,
    /// Selected test names, in filtered order.
    pub tests: Vec<String>,
    pub results: HashMap<String, TestResult>,
    pub elapsed: Duration,
    pub interrupted: bool,
}

impl TestReport {
    pub fn empty(status: RunStatus) -> Self {
        Self {
            status,
            tests: Vec::new(),
            results: HashMap::new(),
            elapsed: Duration::ZERO,
            interrupted: false,
        }
    }

    pub fn ok(&self) -> bool {
        match self.status {
            RunStatus::NoTestsConfigured => true,
            RunStatus::NoTestsMatched => false,
            RunStatus::Completed => {
                !self.interrupted
                    && self.tests.iter().all(|name| self.results.contains_key(name))
                    && self.results.values().all(|r| r.ok)
            }
        }
    }

    /// Number of distinct tests that produced a result.
    pub fn num_tests(&self) -> usize {
        self.results.len()
    }

    /// Failing results in filtered order, each name once.
    pub fn failures(&self) -> Vec<&TestResult> {
        let mut seen = HashSet::new();
        self.tests
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .filter_map(|name| self.results.get(name))
            .filter(|r| !r.ok)
            .collect()
    }

    pub fn failed_names(&self) -> Vec<String> {
        self.failures().into_iter().map(|r| r.name.clone()).collect()
    }

    /// Left-padded `name  message` lines, one per failure.
    pub fn failure_listing(&self) -> Vec<String> {
        let failures = self.failures();
        let max_len = failures.iter().map(|r| r.name.len()).max().unwrap_or(0);
        failures
            .iter()
            .map(|r| format!("{:<width$}{}", r.name, r.message, width = max_len + 2))
            .collect()
    }

    pub fn print_summary(&self, sink: &dyn OutputSink) {
        match self.status {
            RunStatus::NoTestsConfigured => {
                sink.warning("No tests configured");
                return;
            }
            RunStatus::NoTestsMatched => {
                sink.error("No tests found");
                return;
            }
            RunStatus::Completed => {}
        }

        sink.info(&format!(
            "Ran {} tests in {}s",
            self.num_tests(),
            self.elapsed.as_secs()
        ));
        if self.ok() {
            sink.info(&sink.paint(Style::Green, "All pass. Congrats!"));
            return;
        }

        let failures = self.failures();
        if !failures.is_empty() {
            sink.error(&format!("{} failures", failures.len()));
        }
        let max_len = failures.iter().map(|r| r.name.len()).max().unwrap_or(0);
        for (i, failure) in failures.iter().enumerate() {
            sink.info(&format!(
                "{} {} {}{}",
                sink.paint(Style::Green, "*"),
                counter(i, failures.len()),
                sink.paint(
                    Style::Blue,
                    &format!("{:<width$}", failure.name, width = max_len + 2)
                ),
                sink.paint(failure.style(), &failure.message),
            ));
        }
        if self.interrupted {
            sink.warning("Run was interrupted");
        }
    }
}
