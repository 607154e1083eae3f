use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;

use qitree::qitest::{Outcome, PreparedTest, TestLauncher, TestResult};

/// What the fake launcher does with a given test.
#[derive(Debug, Clone)]
pub enum Fate {
    Pass,
    Fail(i32),
    /// Take this long, then pass. Interrupting the run cuts it short.
    Sleep(Duration),
    /// The launcher returns an error.
    Raise(String),
    /// The launcher panics.
    Panic(String),
}

/// A fake launcher that:
/// - never spawns a process
/// - decides each outcome from the program, then the test name
/// - records the prepared tests it was given and the peak concurrency.
pub struct FakeLauncher {
    fates: HashMap<String, Fate>,
    program_fates: HashMap<String, Fate>,
    default: Fate,
    launched: Arc<Mutex<Vec<PreparedTest>>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl Default for FakeLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeLauncher {
    /// Every test passes unless told otherwise.
    pub fn new() -> Self {
        Self {
            fates: HashMap::new(),
            program_fates: HashMap::new(),
            default: Fate::Pass,
            launched: Arc::new(Mutex::new(Vec::new())),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
        }
    }

    pub fn with_fate(mut self, name: &str, fate: Fate) -> Self {
        self.fates.insert(name.to_string(), fate);
        self
    }

    /// Fate of any test whose prepared command starts with `program`. Wins
    /// over the fate given by name.
    pub fn with_program_fate(mut self, program: &str, fate: Fate) -> Self {
        self.program_fates.insert(program.to_string(), fate);
        self
    }

    pub fn with_default(mut self, fate: Fate) -> Self {
        self.default = fate;
        self
    }

    /// Shared view on the launched tests, usable after the launcher has been
    /// moved into a queue.
    pub fn launched_handle(&self) -> Arc<Mutex<Vec<PreparedTest>>> {
        Arc::clone(&self.launched)
    }

    pub fn launched_names(&self) -> Vec<String> {
        self.launched
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.name.clone())
            .collect()
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    async fn outcome(&self, fate: Fate, interrupt: &mut watch::Receiver<bool>) -> anyhow::Result<Outcome> {
        match fate {
            Fate::Pass => Ok(Outcome::Ok),
            Fate::Fail(code) => Ok(Outcome::Failed(code)),
            Fate::Sleep(duration) => {
                tokio::select! {
                    _ = tokio::time::sleep(duration) => Ok(Outcome::Ok),
                    _ = interrupted(interrupt) => Ok(Outcome::Interrupted),
                }
            }
            Fate::Raise(message) => Err(anyhow::anyhow!(message)),
            Fate::Panic(message) => panic!("{message}"),
        }
    }
}

async fn interrupted(interrupt: &mut watch::Receiver<bool>) {
    let closed = interrupt.wait_for(|i| *i).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

impl TestLauncher for FakeLauncher {
    fn launch<'a>(
        &'a self,
        test: &'a PreparedTest,
        mut interrupt: watch::Receiver<bool>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<TestResult>> + Send + 'a>> {
        Box::pin(async move {
            self.launched.lock().unwrap().push(test.clone());
            let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(running, Ordering::SeqCst);

            let fate = test
                .cmd
                .first()
                .and_then(|program| self.program_fates.get(program))
                .or_else(|| self.fates.get(&test.name))
                .cloned()
                .unwrap_or_else(|| self.default.clone());
            let outcome = self.outcome(fate, &mut interrupt).await;
            self.running.fetch_sub(1, Ordering::SeqCst);

            Ok(TestResult::from_outcome(
                &test.name,
                outcome?,
                test.timeout,
                Duration::ZERO,
                "",
            ))
        })
    }
}
