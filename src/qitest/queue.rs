// src/qitest/queue.rs

//! Bounded parallel execution of a list of tests.
//!
//! - `num_jobs` worker tasks pull `(index, descriptor)` pairs from one FIFO.
//! - Each launch runs in its own Tokio task, so a launcher that panics or
//!   fails is turned into an infrastructure error result instead of taking
//!   the worker down.
//! - Workers never touch shared results: they send [`WorkerEvent`]s to a
//!   single aggregator which owns the progress logger and the result map.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::errors::{QitreeError, Result};
use crate::output::{OutputSink, Style};
use crate::qitest::conf::TestDescriptor;
use crate::qitest::launcher::TestLauncher;
use crate::qitest::logger::TestLogger;
use crate::qitest::prepare::{Enrichment, prepare};
use crate::qitest::report::{RunStatus, TestReport};
use crate::qitest::result::{Outcome, TestResult};

/// Shared cancellation flag for a run.
///
/// Cloning gives another handle on the same flag. Once set it stays set.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for InterruptHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Stop pulling new tests and kill the running ones.
    pub fn interrupt(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_interrupted(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Messages from workers to the aggregator.
#[derive(Debug)]
enum WorkerEvent {
    Started { index: usize, name: String },
    Completed { index: usize, result: TestResult },
}

type WorkQueue = Arc<Mutex<VecDeque<(usize, TestDescriptor)>>>;

pub struct TestQueue<L> {
    tests: Vec<TestDescriptor>,
    launcher: Arc<L>,
    enrichment: Arc<Enrichment>,
    sink: Arc<dyn OutputSink>,
    interrupt: InterruptHandle,
    verbose: bool,
}

impl<L> TestQueue<L>
where
    L: TestLauncher + 'static,
{
    /// `tests` is the already filtered list, in the order results are
    /// reported.
    pub fn new(
        tests: Vec<TestDescriptor>,
        launcher: Arc<L>,
        enrichment: Enrichment,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            tests,
            launcher,
            enrichment: Arc::new(enrichment),
            sink,
            interrupt: InterruptHandle::new(),
            verbose: false,
        }
    }

    pub fn with_interrupt(mut self, interrupt: InterruptHandle) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    pub fn tests(&self) -> &[TestDescriptor] {
        &self.tests
    }

    /// Run every test once and print the summary.
    ///
    /// Failing tests are data in the report. An `Err` means the harness
    /// broke while launching at least one test.
    pub async fn run(&self, num_jobs: usize) -> Result<TestReport> {
        if self.tests.is_empty() {
            let report = TestReport::empty(RunStatus::NoTestsMatched);
            report.print_summary(self.sink.as_ref());
            return Ok(report);
        }

        let start = Instant::now();
        let single_job = num_jobs <= 1;
        let num_workers = num_jobs.clamp(1, self.tests.len());
        info!(tests = self.tests.len(), workers = num_workers, "starting test queue");

        let work: WorkQueue = Arc::new(Mutex::new(
            self.tests.iter().cloned().enumerate().collect(),
        ));
        let (tx, rx) = mpsc::channel::<WorkerEvent>(64);

        let mut handles = Vec::with_capacity(num_workers);
        for worker in 0..num_workers {
            handles.push(tokio::spawn(worker_loop(
                worker,
                work.clone(),
                self.launcher.clone(),
                self.enrichment.clone(),
                tx.clone(),
                self.interrupt.clone(),
            )));
        }
        drop(tx);

        let logger = TestLogger::new(
            self.sink.clone(),
            self.tests.iter().map(|t| t.name.as_str()),
            single_job,
        )
        .verbose(self.verbose);
        let mut results = aggregate(rx, &logger, self.interrupt.subscribe()).await;

        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "test worker ended abnormally");
            }
        }

        let interrupted = self.interrupt.is_interrupted();
        if !interrupted {
            for test in &self.tests {
                if !results.contains_key(&test.name) {
                    warn!(test = %test.name, "no result recorded for test");
                    results.insert(
                        test.name.clone(),
                        TestResult::infrastructure_error(
                            &test.name,
                            "test worker stopped before reporting a result",
                        ),
                    );
                }
            }
        }

        let report = TestReport {
            status: RunStatus::Completed,
            tests: self.tests.iter().map(|t| t.name.clone()).collect(),
            results,
            elapsed: start.elapsed(),
            interrupted,
        };
        report.print_summary(self.sink.as_ref());

        let broken = report
            .tests
            .iter()
            .filter_map(|name| report.results.get(name))
            .find(|r| r.error);
        if let Some(broken) = broken {
            return Err(QitreeError::LaunchInfrastructure {
                test: broken.name.clone(),
                message: broken.raw_output.clone(),
            });
        }

        Ok(report)
    }

    /// Run the whole queue up to `max_runs` times, stopping at the first
    /// run that is not ok. Returns the last report.
    pub async fn run_until_fail(&self, num_jobs: usize, max_runs: usize) -> Result<TestReport> {
        if max_runs == 0 {
            return self.run(num_jobs).await;
        }

        self.sink.info(&format!(
            "{} Running tests until they fail",
            self.sink.paint(Style::Blue, "::")
        ));
        let mut report = TestReport::empty(RunStatus::Completed);
        for run in 0..max_runs {
            self.sink
                .info(&self.sink.paint(Style::Bold, &format!("Test run #{}", run + 1)));
            report = self.run(num_jobs).await?;
            self.sink.info("");
            if !report.ok() {
                break;
            }
        }
        Ok(report)
    }
}

async fn aggregate(
    mut rx: mpsc::Receiver<WorkerEvent>,
    logger: &TestLogger,
    mut interrupt: watch::Receiver<bool>,
) -> HashMap<String, TestResult> {
    let mut results = HashMap::new();
    let mut interrupted = *interrupt.borrow();
    let mut watching = true;

    loop {
        tokio::select! {
            biased;

            changed = interrupt.changed(), if watching => {
                if changed.is_err() {
                    watching = false;
                } else if *interrupt.borrow_and_update() && !interrupted {
                    interrupted = true;
                    logger.on_interrupted();
                }
            }

            event = rx.recv() => {
                let Some(event) = event else { break };
                match event {
                    WorkerEvent::Started { index, name } => {
                        if !interrupted {
                            logger.on_start(index, &name);
                        }
                    }
                    WorkerEvent::Completed { index, result } => {
                        if !interrupted {
                            logger.on_completed(index, &result);
                        }
                        if results.contains_key(&result.name) {
                            warn!(test = %result.name, "duplicate test name; keeping the last result");
                        }
                        results.insert(result.name.clone(), result);
                    }
                }
            }
        }
    }

    results
}

async fn worker_loop<L>(
    worker: usize,
    work: WorkQueue,
    launcher: Arc<L>,
    enrichment: Arc<Enrichment>,
    events: mpsc::Sender<WorkerEvent>,
    interrupt: InterruptHandle,
) where
    L: TestLauncher + 'static,
{
    debug!(worker, "test worker started");
    loop {
        if interrupt.is_interrupted() {
            debug!(worker, "interrupted; not taking more tests");
            break;
        }
        let next = work.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
        let Some((index, test)) = next else {
            break;
        };

        let _ = events
            .send(WorkerEvent::Started {
                index,
                name: test.name.clone(),
            })
            .await;

        let result = launch_one(
            worker,
            &test,
            launcher.clone(),
            enrichment.clone(),
            interrupt.subscribe(),
        )
        .await;
        debug!(worker, test = %test.name, ok = result.ok, "test completed");

        if events
            .send(WorkerEvent::Completed { index, result })
            .await
            .is_err()
        {
            break;
        }
    }
    debug!(worker, "test worker finished");
}

/// Prepare and launch one test in its own task, so a panic in either step
/// ends up as an infrastructure error result.
async fn launch_one<L>(
    worker: usize,
    test: &TestDescriptor,
    launcher: Arc<L>,
    enrichment: Arc<Enrichment>,
    interrupt: watch::Receiver<bool>,
) -> TestResult
where
    L: TestLauncher + 'static,
{
    let descriptor = test.clone();
    let handle = tokio::spawn(async move {
        let prepared = match prepare(&descriptor, &enrichment, worker) {
            Ok(prepared) => prepared,
            Err(err) => {
                return Ok(TestResult::from_outcome(
                    &descriptor.name,
                    Outcome::NotRun(err.to_string()),
                    None,
                    Duration::ZERO,
                    "",
                ));
            }
        };
        launcher.launch(&prepared, interrupt).await
    });
    match handle.await {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => {
            warn!(test = %test.name, error = %err, "launcher failed");
            TestResult::infrastructure_error(&test.name, format!("{err:#}"))
        }
        Err(join_err) => {
            let message = if join_err.is_panic() {
                format!("launcher panicked: {}", panic_message(join_err.into_panic()))
            } else {
                "launch was cancelled".to_string()
            };
            warn!(test = %test.name, %message, "launcher failed");
            TestResult::infrastructure_error(&test.name, message)
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
