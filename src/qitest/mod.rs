// src/qitest/mod.rs

//! Test queue.
//!
//! Runs a list of independent test processes with bounded parallelism and
//! reports which ones failed.
//!
//! - [`conf`] reads and writes the `qitest.json` test list.
//! - [`filter`] selects the tests to run.
//! - [`prepare`] builds the working copy of a test (environment, timeout,
//!   valgrind / taskset wrapping, framework output arguments).
//! - [`process`] and [`launcher`] run one test and classify its outcome.
//! - [`queue`] dispatches tests to workers and aggregates their results.
//! - [`logger`] and [`report`] print progress and the final summary.
//! - [`runner`] validates options and ties everything together.

pub mod conf;
pub mod filter;
pub mod launcher;
pub mod logger;
pub mod prepare;
pub mod process;
pub mod queue;
pub mod report;
pub mod result;
pub mod runner;
pub mod valgrind;

pub use conf::{TestDescriptor, add_test, parse_tests, relocate_tests, write_tests};
pub use filter::TestFilter;
pub use launcher::{ProcessLauncher, TestLauncher};
pub use prepare::{Enrichment, PreparedTest, prepare};
pub use queue::{InterruptHandle, TestQueue};
pub use report::{RunStatus, TestReport};
pub use result::{Outcome, TestResult};
pub use runner::{RunnerOptions, TestSuiteRunner};
