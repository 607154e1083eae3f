#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use qitree_test_utils::memory_sink::MemorySink;
pub use qitree_test_utils::{init_tracing, with_timeout};

use qitree::output::OutputSink;

/// A fresh capturing sink, plus the same sink as the trait object the
/// queue and runner take.
pub fn memory_sink() -> (Arc<MemorySink>, Arc<dyn OutputSink>) {
    let sink = Arc::new(MemorySink::new());
    let dyn_sink: Arc<dyn OutputSink> = sink.clone();
    (sink, dyn_sink)
}

/// Write an executable shell script.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}
