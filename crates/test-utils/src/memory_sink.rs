use std::sync::Mutex;

use qitree::output::OutputSink;

/// Output sink keeping every line in memory, without colors.
///
/// Warnings and errors are stored with a `WARN: ` / `ERROR: ` prefix.
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
    pending: Mutex<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().unwrap().iter().any(|l| l.contains(needle))
    }

    fn push(&self, line: String) {
        let mut pending = self.pending.lock().unwrap();
        let full = format!("{}{}", pending, line);
        pending.clear();
        self.lines.lock().unwrap().push(full);
    }
}

impl OutputSink for MemorySink {
    fn info(&self, line: &str) {
        self.push(line.to_string());
    }

    fn warning(&self, line: &str) {
        self.push(format!("WARN: {line}"));
    }

    fn error(&self, line: &str) {
        self.push(format!("ERROR: {line}"));
    }

    fn info_partial(&self, text: &str) {
        self.pending.lock().unwrap().push_str(text);
    }

    fn color_enabled(&self) -> bool {
        false
    }
}
