// src/output.rs

//! User-facing console output.
//!
//! Reports and progress lines go through an [`OutputSink`] handed down the
//! call chain, never through a process-wide UI singleton. Diagnostics stay
//! on `tracing` (STDERR); sinks write what the user asked to see.

use std::io::{IsTerminal, Write};
use std::sync::Mutex;

/// Coloring applied to a piece of text when the sink supports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Green,
    Red,
    Blue,
    Brown,
    Bold,
}

impl Style {
    fn ansi(self) -> &'static str {
        match self {
            Style::Green => "\x1b[32;1m",
            Style::Red => "\x1b[31;1m",
            Style::Blue => "\x1b[34;1m",
            Style::Brown => "\x1b[33m",
            Style::Bold => "\x1b[1m",
        }
    }
}

/// Where user-visible lines go.
///
/// Implementations must be safe to share between test workers: a whole line
/// is written at once so that concurrent workers never interleave inside a
/// line.
pub trait OutputSink: Send + Sync {
    fn info(&self, line: &str);
    fn warning(&self, line: &str);
    fn error(&self, line: &str);

    /// Write without a trailing newline, so that the next `info` completes
    /// the line. Used by sequential runs to print progress in place.
    fn info_partial(&self, text: &str) {
        self.info(text);
    }

    fn color_enabled(&self) -> bool;

    fn paint(&self, style: Style, text: &str) -> String {
        if self.color_enabled() {
            format!("{}{}\x1b[0m", style.ansi(), text)
        } else {
            text.to_string()
        }
    }
}

/// Sink writing to STDOUT (info) and STDERR (warnings, errors).
#[derive(Debug)]
pub struct ConsoleSink {
    color: bool,
    lock: Mutex<()>,
}

impl ConsoleSink {
    pub fn new(color: bool) -> Self {
        Self {
            color,
            lock: Mutex::new(()),
        }
    }

    /// Color only when STDOUT is a terminal.
    pub fn auto() -> Self {
        Self::new(std::io::stdout().is_terminal())
    }

    fn write_out(&self, text: &str, newline: bool) {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut out = std::io::stdout().lock();
        let _ = if newline {
            writeln!(out, "{text}")
        } else {
            write!(out, "{text}")
        };
        let _ = out.flush();
    }

    fn write_err(&self, text: &str) {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let _ = writeln!(std::io::stderr().lock(), "{text}");
    }
}

impl OutputSink for ConsoleSink {
    fn info(&self, line: &str) {
        self.write_out(line, true);
    }

    fn warning(&self, line: &str) {
        let prefix = self.paint(Style::Brown, "[WARN]:");
        self.write_err(&format!("{prefix} {line}"));
    }

    fn error(&self, line: &str) {
        let prefix = self.paint(Style::Red, "[ERROR]:");
        self.write_err(&format!("{prefix} {line}"));
    }

    fn info_partial(&self, text: &str) {
        self.write_out(text, false);
    }

    fn color_enabled(&self) -> bool {
        self.color
    }
}
