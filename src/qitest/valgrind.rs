// src/qitest/valgrind.rs

//! Post-processing of valgrind logs.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::qitest::result::TestResult;

/// stdin, stdout, stderr and the valgrind log itself.
const EXPECTED_OPEN_FDS: u32 = 4;

static FD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"==\d+== FILE DESCRIPTORS: (\d+)").expect("valid regex"));
static INVALID_READ_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"==\d+== Invalid read of size (\d+)").expect("valid regex"));

/// Problems found in a valgrind log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValgrindSummary {
    pub errors: Vec<String>,
}

impl ValgrindSummary {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn parse_valgrind(log: &str) -> ValgrindSummary {
    let mut errors = Vec::new();
    for line in log.lines() {
        if let Some(caps) = FD_RE.captures(line) {
            let open: u32 = caps[1].parse().unwrap_or(0);
            if open > EXPECTED_OPEN_FDS {
                errors.push(format!(
                    "Error file descriptor leaks: {}",
                    open - EXPECTED_OPEN_FDS
                ));
            }
        }
        if let Some(caps) = INVALID_READ_RE.captures(line) {
            errors.push(format!("Invalid read {}", &caps[1]));
        }
    }
    ValgrindSummary { errors }
}

/// Fold the valgrind log at `log_path` into `result`.
///
/// The log is appended to the output; any problem found turns the result
/// into a failure.
pub fn apply_valgrind_log(result: &mut TestResult, log_path: &Path) {
    let log = match std::fs::read_to_string(log_path) {
        Ok(log) => log,
        Err(err) => {
            warn!(
                test = %result.name,
                path = %log_path.display(),
                error = %err,
                "no valgrind log found"
            );
            return;
        }
    };

    let summary = parse_valgrind(&log);
    if result.raw_output == super::result::NO_OUTPUT {
        result.raw_output.clear();
    }
    if !result.raw_output.is_empty() {
        result.raw_output.push('\n');
    }
    result.raw_output.push_str(&log);

    if !summary.is_clean() {
        result.ok = false;
        result.message = format!("{}\n{}", result.message, summary.errors.join("\n"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::output::Style;

    #[test]
    fn clean_log_has_no_errors() {
        let log = "==1234== FILE DESCRIPTORS: 4 open at exit.\n==1234== All heap blocks were freed";
        assert!(parse_valgrind(log).is_clean());
    }

    #[test]
    fn reports_fd_leaks_and_invalid_reads() {
        let log = "\
==42== Invalid read of size 8
==42==    at 0x4005F4: main (leak.c:12)
==42== FILE DESCRIPTORS: 6 open at exit.
";
        assert_eq!(
            parse_valgrind(log).errors,
            vec!["Invalid read 8", "Error file descriptor leaks: 2"]
        );
    }

    #[test]
    fn leaks_turn_result_into_failure() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("t_valgrind.log");
        std::fs::write(&log_path, "==7== FILE DESCRIPTORS: 5 open at exit.\n").unwrap();

        let mut result = TestResult::passed("t", Duration::ZERO);
        apply_valgrind_log(&mut result, &log_path);

        assert!(!result.ok);
        assert!(result.message.contains("Error file descriptor leaks: 1"));
        assert_eq!(result.style(), Style::Red);
        assert!(result.raw_output.starts_with("==7== FILE DESCRIPTORS"));
    }

    #[test]
    fn log_follows_captured_output() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("t_valgrind.log");
        std::fs::write(&log_path, "==7== All heap blocks were freed\n").unwrap();

        let mut result = TestResult::failed("t", 1, "test output");
        apply_valgrind_log(&mut result, &log_path);

        assert!(result.raw_output.starts_with("test output"));
        assert!(result.raw_output.contains("\n==7== All heap blocks"));
    }

    #[test]
    fn missing_log_leaves_result_alone() {
        let mut result = TestResult::passed("t", Duration::ZERO);
        let before = result.clone();
        apply_valgrind_log(&mut result, Path::new("/nonexistent/t_valgrind.log"));
        assert_eq!(result, before);
    }
}
