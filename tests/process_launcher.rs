// tests/process_launcher.rs
#![cfg(unix)]

mod common;
use crate::common::{init_tracing, with_timeout, write_script};

use std::path::Path;
use std::time::{Duration, Instant};

use qitree::qitest::conf::TestDescriptor;
use qitree::qitest::launcher::{ProcessLauncher, TestLauncher};
use qitree::qitest::prepare::{Enrichment, prepare};
use qitree::qitest::queue::InterruptHandle;
use qitree::qitest::result::{NO_OUTPUT, Outcome, TestResult};

async fn launch_in(dir: &Path, test: TestDescriptor, launcher: &ProcessLauncher) -> TestResult {
    let prepared = prepare(&test, &Enrichment::new(dir), 0).unwrap();
    let interrupt = InterruptHandle::new();
    with_timeout(launcher.launch(&prepared, interrupt.subscribe()))
        .await
        .unwrap()
}

fn sh(name: &str, script: &str) -> TestDescriptor {
    TestDescriptor::new(name, ["/bin/sh", "-c", script])
}

#[tokio::test]
async fn zero_exit_is_ok() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    let res = launch_in(dir.path(), sh("ok", "exit 0"), &ProcessLauncher::default()).await;

    assert!(res.ok);
    assert_eq!(res.outcome, Outcome::Ok);
    assert_eq!(res.message, "[OK]");
    assert_eq!(res.raw_output, NO_OUTPUT);
}

#[tokio::test]
async fn non_zero_exit_is_a_failure_with_output() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    let res = launch_in(
        dir.path(),
        sh("fail", "echo hello; echo oops >&2; exit 3"),
        &ProcessLauncher::default(),
    )
    .await;

    assert!(!res.ok);
    assert!(!res.error);
    assert_eq!(res.message, "[FAIL] Return code: 3");
    assert!(res.raw_output.contains("hello"));
    assert!(res.raw_output.contains("oops"));
}

#[tokio::test]
async fn missing_executable_is_not_run() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let test = TestDescriptor::new("missing", ["/nonexistent/bin/test_foo"]);

    let res = launch_in(dir.path(), test, &ProcessLauncher::default()).await;

    assert!(!res.ok);
    assert!(!res.error);
    assert!(matches!(res.outcome, Outcome::NotRun(_)));
    assert!(res.message.contains("no such file or directory"), "{}", res.message);
}

#[tokio::test]
async fn timeout_kills_the_test() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let mut test = sh("slow", "sleep 30");
    test.timeout = Some(1);

    let start = Instant::now();
    let res = launch_in(dir.path(), test, &ProcessLauncher::default()).await;

    assert!(!res.ok);
    assert_eq!(res.outcome, Outcome::TimedOut);
    assert_eq!(res.message, "Timed out (1s)");
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_ignoring_sigterm_becomes_a_zombie() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let mut test = sh("stubborn", "trap '' TERM; sleep 30");
    test.timeout = Some(1);
    let launcher = ProcessLauncher {
        kill_grace: Duration::from_millis(300),
        ..ProcessLauncher::default()
    };

    let res = launch_in(dir.path(), test, &launcher).await;

    assert_eq!(res.outcome, Outcome::Zombie);
    assert_eq!(res.message, "Zombie (Timeout = 1s)");
}

#[tokio::test]
async fn crash_is_named_after_the_signal() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    let res = launch_in(dir.path(), sh("crash", "kill -SEGV $$"), &ProcessLauncher::default()).await;

    assert!(!res.ok);
    assert_eq!(res.message, "Segmentation fault");
}

#[tokio::test]
async fn environment_and_working_directory_are_applied() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let workdir = dir.path().join("work");
    std::fs::create_dir(&workdir).unwrap();

    let mut test = sh("env", "test \"$QITREE_FOO\" = bar && touch marker");
    test.environment.insert("QITREE_FOO".to_string(), "bar".to_string());
    test.working_directory = Some(workdir.clone());

    let res = launch_in(dir.path(), test, &ProcessLauncher::default()).await;

    assert!(res.ok, "{res:?}");
    assert!(workdir.join("marker").exists());
}

#[tokio::test]
async fn relative_executable_is_found_in_cwd() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), "run_me.sh", "exit 0");

    let res = launch_in(
        dir.path(),
        TestDescriptor::new("relative", ["run_me.sh"]),
        &ProcessLauncher::default(),
    )
    .await;

    assert!(res.ok, "{res:?}");
}

#[tokio::test]
async fn interrupt_kills_the_running_test() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let prepared = prepare(&sh("slow", "sleep 30"), &Enrichment::new(dir.path()), 0).unwrap();
    let interrupt = InterruptHandle::new();
    let handle = interrupt.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.interrupt();
    });

    let launcher = ProcessLauncher::default();
    let res = with_timeout(launcher.launch(&prepared, interrupt.subscribe()))
        .await
        .unwrap();

    assert_eq!(res.outcome, Outcome::Interrupted);
    assert!(!res.ok);
}
