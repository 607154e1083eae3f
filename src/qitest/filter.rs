// src/qitest/filter.rs

//! Selection of the tests to run.

use std::collections::HashSet;

use regex::Regex;

use crate::errors::{QitreeError, Result};
use crate::qitest::conf::TestDescriptor;

/// Compiled test selection. Built before anything runs so that a bad
/// pattern is reported up front.
#[derive(Debug, Clone, Default)]
pub struct TestFilter {
    patterns: Vec<Regex>,
    excludes: Vec<Regex>,
    perf: bool,
    nightly: bool,
    only: Option<HashSet<String>>,
}

impl TestFilter {
    /// - `patterns`: a test is kept if its name matches any of them (all
    ///   tests when empty).
    /// - `excludes`: a test is dropped if its name matches any of them.
    /// - `perf` / `nightly`: the test flag must equal the requested value.
    pub fn new(patterns: &[String], excludes: &[String], perf: bool, nightly: bool) -> Result<Self> {
        Ok(Self {
            patterns: compile_all(patterns)?,
            excludes: compile_all(excludes)?,
            perf,
            nightly,
            only: None,
        })
    }

    /// Restrict the selection to the given names (used to re-run the tests
    /// that failed last time).
    pub fn only(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.only = Some(names.into_iter().collect());
        self
    }

    pub fn matches(&self, test: &TestDescriptor) -> bool {
        let included =
            self.patterns.is_empty() || self.patterns.iter().any(|re| re.is_match(&test.name));
        let excluded = self.excludes.iter().any(|re| re.is_match(&test.name));
        let wanted = self
            .only
            .as_ref()
            .is_none_or(|names| names.contains(&test.name));

        included
            && !excluded
            && wanted
            && test.perf == self.perf
            && test.nightly == self.nightly
    }

    /// Matching tests, in their original order.
    pub fn select(&self, tests: &[TestDescriptor]) -> Vec<TestDescriptor> {
        tests.iter().filter(|t| self.matches(t)).cloned().collect()
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| {
                QitreeError::ConfigError(format!("invalid test pattern '{p}': {e}"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test(name: &str) -> TestDescriptor {
        TestDescriptor::new(name, ["/bin/true"])
    }

    fn names(tests: &[TestDescriptor]) -> Vec<&str> {
        tests.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn pattern_is_a_search_not_a_full_match() {
        let tests = vec![test("test_foo"), test("test_bar"), test("test_foo_bar")];
        let filter = TestFilter::new(&["foo".to_string()], &[], false, false).unwrap();

        assert_eq!(names(&filter.select(&tests)), vec!["test_foo", "test_foo_bar"]);
    }

    #[test]
    fn excludes_win_over_patterns() {
        let tests = vec![test("test_foo"), test("test_bar"), test("test_foo_bar")];
        let filter =
            TestFilter::new(&["foo".to_string()], &["bar$".to_string()], false, false).unwrap();

        assert_eq!(names(&filter.select(&tests)), vec!["test_foo"]);
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        match TestFilter::new(&["foo(".to_string()], &[], false, false) {
            Err(QitreeError::ConfigError(msg)) => assert!(msg.contains("foo(")),
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn perf_and_nightly_flags_must_match_exactly() {
        let mut perf = test("perf");
        perf.perf = true;
        let mut nightly = test("nightly");
        nightly.nightly = true;
        let tests = vec![test("plain"), perf, nightly];

        let default = TestFilter::new(&[], &[], false, false).unwrap();
        assert_eq!(names(&default.select(&tests)), vec!["plain"]);

        let perf_only = TestFilter::new(&[], &[], true, false).unwrap();
        assert_eq!(names(&perf_only.select(&tests)), vec!["perf"]);

        let nightly_only = TestFilter::new(&[], &[], false, true).unwrap();
        assert_eq!(names(&nightly_only.select(&tests)), vec!["nightly"]);
    }

    #[test]
    fn only_restricts_to_given_names() {
        let tests = vec![test("one"), test("two"), test("three")];
        let filter = TestFilter::new(&[], &[], false, false)
            .unwrap()
            .only(vec!["three".to_string(), "one".to_string()]);

        assert_eq!(names(&filter.select(&tests)), vec!["one", "three"]);
    }
}
