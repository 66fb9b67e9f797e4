//! User-facing output
//!
//! Everything the user reads goes through [`Console`]; diagnostics go
//! through `tracing` instead.

use std::io::Write;
use std::sync::Mutex;

pub trait Console: Send + Sync {
    /// Print a line of user-facing text.
    fn print(&self, text: &str);

    /// Print the input prompt (no trailing newline).
    fn prompt(&self, text: &str) {
        self.print(text);
    }
}

/// Console writing to the process stdout
#[derive(Debug, Default)]
pub struct StdoutConsole;

impl Console for StdoutConsole {
    fn print(&self, text: &str) {
        println!("{}", text);
    }

    fn prompt(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "{}", text);
        let _ = out.flush();
    }
}

/// Console that keeps everything it was asked to print
#[derive(Debug, Default)]
pub struct RecordingConsole {
    lines: Mutex<Vec<String>>,
}

impl RecordingConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Everything printed so far, newline separated.
    pub fn transcript(&self) -> String {
        self.lines().join("\n")
    }
}

impl Console for RecordingConsole {
    fn print(&self, text: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(text.to_string());
        }
    }

    fn prompt(&self, _text: &str) {}
}
