// src/lib.rs

pub mod cli;
pub mod config;
pub mod deps;
pub mod errors;
pub mod logging;
pub mod output;
pub mod qitest;
pub mod types;

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::{AddTestArgs, CliArgs, Command, DepsArgs, TestArgs};
use crate::config::loader::load_and_validate;
use crate::deps::DepsSolver;
use crate::output::{ConsoleSink, OutputSink};
use crate::qitest::conf::{TestDescriptor, add_test};
use crate::qitest::queue::InterruptHandle;
use crate::qitest::runner::{RunnerOptions, TestSuiteRunner};
use crate::types::CyclePolicy;

/// High-level entry point used by `main.rs`.
///
/// Returns whether the command succeeded (all tests passed for `test`).
/// Configuration problems come back as errors.
pub async fn run(args: CliArgs) -> Result<bool> {
    let color = args.color.enabled();
    let sink: Arc<dyn OutputSink> = Arc::new(ConsoleSink::new(color));

    match args.command {
        Command::Deps(deps) => run_deps(&deps, sink.as_ref()),
        Command::Test(test) => run_tests(test, color, sink).await,
        Command::AddTest(add) => run_add_test(add),
    }
}

fn run_deps(args: &DepsArgs, sink: &dyn OutputSink) -> Result<bool> {
    let worktree = load_and_validate(&args.worktree)?;
    let solver = DepsSolver::new(worktree.projects());
    let policy = if args.strict {
        CyclePolicy::Error
    } else {
        CyclePolicy::Break
    };

    let names: Vec<String> = if args.host {
        solver.host_names(&args.projects)?
    } else if args.reverse && args.transitive {
        solver
            .transitive_reverse_dependents(&args.projects, &args.dep_types)
            .into_iter()
            .collect()
    } else if args.reverse {
        solver
            .direct_reverse_dependents(&args.projects, &args.dep_types)
            .into_iter()
            .collect()
    } else {
        solver.sorted_names(&args.projects, &args.dep_types, policy)?
    };

    debug!(count = names.len(), "printing dependencies");
    for name in names {
        sink.info(&name);
    }
    Ok(true)
}

async fn run_tests(args: TestArgs, color: bool, sink: Arc<dyn OutputSink>) -> Result<bool> {
    let options = RunnerOptions {
        num_jobs: args.num_jobs,
        patterns: args.patterns,
        excludes: args.excludes,
        perf: args.perf,
        nightly: args.nightly,
        cwd: args.cwd,
        valgrind: args.valgrind,
        num_cpus: args.num_cpus,
        nightmare: args.nightmare,
        break_on_failure: args.break_on_failure,
        ignore_timeouts: args.ignore_timeouts,
        capture: !args.no_capture,
        verbose: args.verbose,
        color,
        repeat_until_fail: args.repeat_until_fail,
        last_failed: args.last_failed,
        results_dir: args.results_dir,
        ..RunnerOptions::default()
    };

    let runner = TestSuiteRunner::from_conf(&args.conf, options, sink.clone())?;
    info!(conf = %args.conf.display(), tests = runner.selected_tests().len(), "loaded tests");

    let ctrl_c = tokio::spawn(handle_ctrl_c(runner.interrupt_handle(), sink.clone()));
    let report = runner.run().await;
    ctrl_c.abort();

    Ok(report?.ok())
}

/// First Ctrl-C stops the run cleanly, the second one exits right away.
async fn handle_ctrl_c(interrupt: InterruptHandle, sink: Arc<dyn OutputSink>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        return;
    }
    interrupt.interrupt();

    if tokio::signal::ctrl_c().await.is_ok() {
        sink.error("Exiting main program\nThis may leave orphan processes");
        std::process::exit(1);
    }
}

fn run_add_test(args: AddTestArgs) -> Result<bool> {
    let mut test = TestDescriptor::new(args.name, args.cmd);
    test.timeout = args.timeout;
    test.working_directory = args.working_directory;
    test.environment = args.environment.into_iter().collect();
    test.gtest = args.gtest;
    test.pytest = args.pytest;
    test.perf = args.perf;
    test.nightly = args.nightly;

    add_test(&args.conf, test)?;
    Ok(true)
}
