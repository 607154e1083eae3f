// src/qitest/result.rs

//! Outcome classification and per-test results.

use std::time::Duration;

use crate::output::Style;

/// Shown instead of the captured output when a test printed nothing.
pub const NO_OUTPUT: &str = "<no output>";

/// How a test process ended. Exactly one applies per launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Exit code 0.
    Ok,
    /// Non-zero exit code.
    Failed(i32),
    /// Terminated by a signal (Unix).
    Signaled(i32),
    /// Killed after exceeding its timeout.
    TimedOut,
    /// Timed out and did not stop when asked to; had to be force-killed.
    Zombie,
    /// Stopped because the run was cancelled.
    Interrupted,
    /// Never started (missing executable, spawn failure).
    NotRun(String),
    /// The harness failed while launching the test.
    LaunchError,
}

impl Outcome {
    /// Human readable classification of the outcome.
    pub fn message(&self, timeout: Option<Duration>) -> String {
        let secs = timeout.map(|t| t.as_secs()).unwrap_or(0);
        match self {
            Outcome::Ok => "[OK]".to_string(),
            Outcome::Failed(code) => format!("[FAIL] Return code: {code}"),
            Outcome::Signaled(sig) => signal_message(*sig),
            Outcome::TimedOut => format!("Timed out ({secs}s)"),
            Outcome::Zombie => format!("Zombie (Timeout = {secs}s)"),
            Outcome::Interrupted => "Interrupted".to_string(),
            Outcome::NotRun(reason) => format!("Not run: {reason}"),
            Outcome::LaunchError => "Error while launching test".to_string(),
        }
    }

    pub fn style(&self) -> Style {
        match self {
            Outcome::Ok => Style::Green,
            Outcome::Interrupted => Style::Brown,
            _ => Style::Red,
        }
    }
}

#[cfg(unix)]
fn signal_message(sig: i32) -> String {
    match sig {
        libc::SIGSEGV => "Segmentation fault".to_string(),
        libc::SIGABRT => "Aborted".to_string(),
        libc::SIGKILL => "Killed".to_string(),
        libc::SIGTERM => "Terminated".to_string(),
        libc::SIGBUS => "Bus error".to_string(),
        libc::SIGFPE => "Floating point exception".to_string(),
        other => format!("Killed by signal {other}"),
    }
}

#[cfg(not(unix))]
fn signal_message(code: i32) -> String {
    // Windows exit codes for crashes read better in hex.
    format!("0x{:X}", code as u32)
}

/// Result of one launch. Immutable once recorded in a report.
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    pub name: String,
    pub outcome: Outcome,
    pub ok: bool,
    pub elapsed: Duration,
    pub message: String,
    /// Combined stdout/stderr, or [`NO_OUTPUT`].
    pub raw_output: String,
    /// Set when the harness itself broke. Such a result aborts the suite
    /// instead of counting as one more failing test.
    pub error: bool,
}

impl TestResult {
    pub fn from_outcome(
        name: impl Into<String>,
        outcome: Outcome,
        timeout: Option<Duration>,
        elapsed: Duration,
        output: impl Into<String>,
    ) -> Self {
        let mut raw_output = output.into();
        if raw_output.is_empty() {
            raw_output = NO_OUTPUT.to_string();
        }
        Self {
            name: name.into(),
            ok: outcome == Outcome::Ok,
            message: outcome.message(timeout),
            outcome,
            elapsed,
            raw_output,
            error: false,
        }
    }

    pub fn passed(name: impl Into<String>, elapsed: Duration) -> Self {
        Self::from_outcome(name, Outcome::Ok, None, elapsed, "")
    }

    pub fn failed(name: impl Into<String>, code: i32, output: impl Into<String>) -> Self {
        Self::from_outcome(name, Outcome::Failed(code), None, Duration::ZERO, output)
    }

    pub fn infrastructure_error(name: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            name: name.into(),
            outcome: Outcome::LaunchError,
            ok: false,
            elapsed: Duration::ZERO,
            raw_output: message.clone(),
            message: format!("Error while launching test: {message}"),
            error: true,
        }
    }

    pub fn style(&self) -> Style {
        match (self.ok, &self.outcome) {
            (true, _) => Style::Green,
            // Turned into a failure after the process exited cleanly.
            (false, Outcome::Ok) => Style::Red,
            (false, outcome) => outcome.style(),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}
