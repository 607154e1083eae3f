// src/qitest/logger.rs

//! Progress lines printed while the queue runs.

use std::sync::Arc;

use crate::output::{OutputSink, Style};
use crate::qitest::result::{NO_OUTPUT, TestResult};

/// Prints one line per started / completed test.
///
/// Owned by the queue aggregator, which is the only task printing progress,
/// so lines from concurrent workers never interleave.
pub struct TestLogger {
    sink: Arc<dyn OutputSink>,
    total: usize,
    max_len: usize,
    single_job: bool,
    verbose: bool,
}

impl TestLogger {
    /// `names` are the selected tests, used for the counter and padding.
    pub fn new<'a>(
        sink: Arc<dyn OutputSink>,
        names: impl IntoIterator<Item = &'a str>,
        single_job: bool,
    ) -> Self {
        let mut total = 0;
        let mut max_len = 0;
        for name in names {
            total += 1;
            max_len = max_len.max(name.len());
        }
        Self {
            sink,
            total,
            max_len,
            single_job,
            verbose: false,
        }
    }

    /// Print the output of passing tests too.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn on_start(&self, index: usize, name: &str) {
        let prefix = self.prefix(index, name);
        if self.single_job {
            // Completed in place by `on_completed`.
            self.sink.info_partial(&format!("{prefix} "));
        } else {
            self.sink.info(&format!("{prefix} starting ..."));
        }
    }

    pub fn on_completed(&self, index: usize, result: &TestResult) {
        let message = self.sink.paint(result.style(), &result.message);
        if self.single_job {
            self.sink.info(&message);
        } else {
            let prefix = self.prefix(index, &result.name);
            self.sink.info(&format!("{prefix} {message}"));
        }

        if (!result.ok || self.verbose) && result.raw_output != NO_OUTPUT {
            self.sink.info(result.raw_output.trim_end());
        }
    }

    pub fn on_interrupted(&self) {
        self.sink.warning(
            "!!! Interrupted by user, stopping every process.\nThis may take a few seconds",
        );
    }

    fn prefix(&self, index: usize, name: &str) -> String {
        format!(
            "{} {} {}",
            self.sink.paint(Style::Green, "*"),
            counter(index, self.total),
            self.sink
                .paint(Style::Blue, &format!("{:<width$}", name, width = self.max_len + 2)),
        )
    }
}

/// `( 5/12)` style counter, `index` being zero-based.
pub fn counter(index: usize, total: usize) -> String {
    let width = total.to_string().len();
    format!("({:>width$}/{total})", index + 1)
}
