// tests/test_queue.rs

mod common;
use crate::common::{init_tracing, memory_sink, with_timeout};

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use qitree::errors::QitreeError;
use qitree::qitest::conf::TestDescriptor;
use qitree::qitest::prepare::{DEFAULT_TIMEOUT_SECS, Enrichment};
use qitree::qitest::queue::TestQueue;
use qitree::qitest::report::RunStatus;
use qitree_test_utils::builders::{TestDescriptorBuilder, tests_named};
use qitree_test_utils::fake_launcher::{Fate, FakeLauncher};

fn queue(
    tests: Vec<TestDescriptor>,
    launcher: &Arc<FakeLauncher>,
) -> (TestQueue<FakeLauncher>, Arc<common::MemorySink>) {
    let (sink, dyn_sink) = memory_sink();
    let queue = TestQueue::new(tests, Arc::clone(launcher), Enrichment::new("/tmp"), dyn_sink);
    (queue, sink)
}

#[tokio::test]
async fn all_passing_tests_make_an_ok_report() {
    init_tracing();
    let launcher = Arc::new(FakeLauncher::new());
    let (queue, sink) = queue(tests_named(&["one", "two", "three"]), &launcher);

    let report = with_timeout(queue.run(2)).await.unwrap();

    assert!(report.ok());
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.num_tests(), 3);
    assert!(sink.contains("Ran 3 tests in"));
    assert!(sink.contains("All pass. Congrats!"));
}

#[tokio::test]
async fn failures_are_listed_in_filtered_order() {
    init_tracing();
    let launcher = Arc::new(
        FakeLauncher::new()
            .with_fate("a", Fate::Sleep(Duration::from_millis(20)))
            .with_fate("b", Fate::Fail(3))
            .with_fate("d", Fate::Fail(1)),
    );
    let (queue, sink) = queue(tests_named(&["a", "b", "c", "d"]), &launcher);

    let report = with_timeout(queue.run(4)).await.unwrap();

    assert!(!report.ok());
    assert_eq!(report.failed_names(), vec!["b", "d"]);
    assert_eq!(
        report.failure_listing(),
        vec!["b  [FAIL] Return code: 3", "d  [FAIL] Return code: 1"]
    );
    assert!(sink.contains("ERROR: 2 failures"));
}

#[tokio::test]
async fn launcher_error_aborts_the_run() {
    init_tracing();
    let launcher = Arc::new(
        FakeLauncher::new().with_fate("boom", Fate::Raise("Kaboom!".to_string())),
    );
    let (queue, _sink) = queue(tests_named(&["ok", "boom", "fail"]), &launcher);

    match with_timeout(queue.run(1)).await {
        Err(QitreeError::LaunchInfrastructure { test, message }) => {
            assert_eq!(test, "boom");
            assert!(message.contains("Kaboom!"), "{message}");
        }
        other => panic!("expected LaunchInfrastructure, got {other:?}"),
    }
    // The other tests still ran.
    assert_eq!(launcher.launched_names().len(), 3);
}

#[tokio::test]
async fn launcher_panic_aborts_the_run() {
    init_tracing();
    let launcher =
        Arc::new(FakeLauncher::new().with_fate("boom", Fate::Panic("Kaboom!".to_string())));
    let (queue, _sink) = queue(tests_named(&["ok", "boom"]), &launcher);

    match with_timeout(queue.run(2)).await {
        Err(QitreeError::LaunchInfrastructure { test, message }) => {
            assert_eq!(test, "boom");
            assert!(message.contains("Kaboom!"), "{message}");
        }
        other => panic!("expected LaunchInfrastructure, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_selection_is_not_ok() {
    init_tracing();
    let launcher = Arc::new(FakeLauncher::new());
    let (queue, sink) = queue(Vec::new(), &launcher);

    let report = queue.run(4).await.unwrap();

    assert_eq!(report.status, RunStatus::NoTestsMatched);
    assert!(!report.ok());
    assert!(sink.contains("ERROR: No tests found"));
    assert!(launcher.launched_names().is_empty());
}

#[tokio::test]
async fn one_job_and_four_jobs_agree() {
    init_tracing();
    let names = ["t0", "t1", "t2", "t3", "t4", "t5", "t6", "t7"];
    let make_launcher = || {
        Arc::new(
            FakeLauncher::new()
                .with_fate("t2", Fate::Fail(1))
                .with_fate("t5", Fate::Fail(2))
                .with_fate("t6", Fate::Sleep(Duration::from_millis(10))),
        )
    };

    let sequential = make_launcher();
    let (q1, _) = queue(tests_named(&names), &sequential);
    let r1 = with_timeout(q1.run(1)).await.unwrap();

    let parallel = make_launcher();
    let (q4, _) = queue(tests_named(&names), &parallel);
    let r4 = with_timeout(q4.run(4)).await.unwrap();

    assert_eq!(r1.ok(), r4.ok());
    let f1: BTreeSet<String> = r1.failed_names().into_iter().collect();
    let f4: BTreeSet<String> = r4.failed_names().into_iter().collect();
    assert_eq!(f1, f4);
    assert_eq!(r1.failed_names(), r4.failed_names());
}

#[tokio::test]
async fn workers_are_bounded_by_num_jobs() {
    init_tracing();
    let launcher =
        Arc::new(FakeLauncher::new().with_default(Fate::Sleep(Duration::from_millis(30))));
    let names: Vec<String> = (0..9).map(|i| format!("t{i}")).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let (queue, _) = queue(tests_named(&names), &launcher);

    let report = with_timeout(queue.run(3)).await.unwrap();

    assert!(report.ok());
    assert_eq!(report.num_tests(), 9);
    assert!(launcher.max_running() <= 3);
    assert!(launcher.max_running() >= 1);
}

#[tokio::test]
async fn launcher_receives_prepared_tests() {
    init_tracing();
    let launcher = Arc::new(FakeLauncher::new());
    let (queue, _) = queue(tests_named(&["one"]), &launcher);

    with_timeout(queue.run(1)).await.unwrap();

    let launched = launcher.launched_handle();
    let launched = launched.lock().unwrap();
    assert_eq!(launched[0].timeout, Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)));
    assert_eq!(launched[0].cwd, std::path::PathBuf::from("/tmp"));
}

#[tokio::test]
async fn sequential_run_prints_compact_progress() {
    init_tracing();
    let launcher = Arc::new(FakeLauncher::new().with_fate("two", Fate::Fail(4)));
    let (queue, sink) = queue(tests_named(&["one", "two"]), &launcher);

    with_timeout(queue.run(1)).await.unwrap();

    let lines = sink.lines();
    assert!(
        lines
            .iter()
            .any(|l| l.starts_with("* (1/2) one") && l.ends_with("[OK]")),
        "{lines:?}"
    );
    assert!(
        lines
            .iter()
            .any(|l| l.starts_with("* (2/2) two") && l.ends_with("[FAIL] Return code: 4")),
        "{lines:?}"
    );
    assert!(!lines.iter().any(|l| l.contains("starting ...")));
}

#[tokio::test]
async fn parallel_run_announces_starts() {
    init_tracing();
    let launcher = Arc::new(FakeLauncher::new());
    let (queue, sink) = queue(tests_named(&["one", "two"]), &launcher);

    with_timeout(queue.run(2)).await.unwrap();

    assert!(sink.contains("starting ..."));
}

#[tokio::test]
async fn interrupt_stops_the_run() {
    init_tracing();
    let launcher =
        Arc::new(FakeLauncher::new().with_default(Fate::Sleep(Duration::from_secs(30))));
    let names: Vec<String> = (0..6).map(|i| format!("t{i}")).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let (queue, sink) = queue(tests_named(&names), &launcher);

    let handle = queue.interrupt_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.interrupt();
    });

    let report = with_timeout(queue.run(2)).await.unwrap();

    assert!(report.interrupted);
    assert!(!report.ok());
    assert!(launcher.launched_names().len() <= 2);
    assert!(sink.contains("Interrupted by user"));
}

#[tokio::test]
async fn repeat_until_fail_runs_until_a_failure() {
    init_tracing();
    let passing = Arc::new(FakeLauncher::new());
    let (queue_ok, sink) = queue(tests_named(&["one", "two"]), &passing);

    let report = with_timeout(queue_ok.run_until_fail(1, 3)).await.unwrap();
    assert!(report.ok());
    assert_eq!(passing.launched_names().len(), 6);
    assert!(sink.contains("Test run #3"));

    let failing = Arc::new(FakeLauncher::new().with_fate("two", Fate::Fail(1)));
    let (queue_ko, _) = queue(tests_named(&["one", "two"]), &failing);

    let report = with_timeout(queue_ko.run_until_fail(1, 3)).await.unwrap();
    assert!(!report.ok());
    assert_eq!(failing.launched_names().len(), 2);
}

#[tokio::test]
async fn overflowing_timeout_still_runs_every_test() {
    init_tracing();
    let launcher = Arc::new(FakeLauncher::new().with_default(Fate::Fail(1)));
    let tests = vec![
        TestDescriptorBuilder::new("repeated")
            .timeout(u64::MAX)
            .env("GTEST_REPEAT", &u64::MAX.to_string())
            .build(),
        TestDescriptorBuilder::new("plain").build(),
    ];
    let (queue, _sink) = queue(tests, &launcher);

    let report = with_timeout(queue.run(1)).await.unwrap();

    assert!(!report.ok());
    assert_eq!(report.num_tests(), 2);
    assert_eq!(report.failed_names(), vec!["repeated", "plain"]);
    assert_eq!(launcher.launched_names(), vec!["repeated", "plain"]);
    let launched = launcher.launched_handle();
    assert_eq!(
        launched.lock().unwrap()[0].timeout,
        Some(Duration::from_secs(u64::MAX))
    );
}

#[tokio::test]
async fn duplicate_names_keep_the_last_result() {
    init_tracing();
    let launcher = Arc::new(
        FakeLauncher::new()
            .with_program_fate("/bin/dup_pass", Fate::Pass)
            .with_program_fate("/bin/dup_fail", Fate::Fail(2)),
    );
    let tests = vec![
        TestDescriptorBuilder::new("dup").cmd(&["/bin/dup_pass"]).build(),
        TestDescriptorBuilder::new("other").build(),
        TestDescriptorBuilder::new("dup").cmd(&["/bin/dup_fail"]).build(),
    ];
    let (queue, sink) = queue(tests, &launcher);

    let report = with_timeout(queue.run(1)).await.unwrap();

    assert_eq!(launcher.launched_names(), vec!["dup", "other", "dup"]);
    assert_eq!(report.num_tests(), 2);
    assert!(!report.results["dup"].ok);
    assert!(!report.ok());
    assert_eq!(report.failed_names(), vec!["dup"]);
    assert_eq!(report.failure_listing(), vec!["dup  [FAIL] Return code: 2"]);
    assert!(sink.contains("ERROR: 1 failures"));
}
