//! Console progress reporting shared by all translation tasks.
//!
//! Tasks never touch stdout directly: every event goes through a
//! [`ProgressReporter`], which renders it to one line and writes that line
//! while holding a lock, so concurrent events never interleave.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Something worth telling the user about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Start(String),
    BatchProgress {
        description: String,
        index: usize,
        total: usize,
    },
    Done(String),
    Error(String),
}

impl ProgressEvent {
    /// Render the event as a single line (no trailing newline)
    pub fn render(&self) -> String {
        match self {
            ProgressEvent::Start(description) => format!("→ {}", description),
            ProgressEvent::BatchProgress {
                description,
                index,
                total,
            } => format!("[{}/{}] {}", index, total, description),
            ProgressEvent::Done(description) => format!("✓ {}", description),
            ProgressEvent::Error(description) => format!("✗ {}", description),
        }
    }
}

/// Thread-safe sink for progress events
pub struct ProgressReporter {
    sink: Mutex<Box<dyn Write + Send>>,
}

impl ProgressReporter {
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        Self {
            sink: Mutex::new(Box::new(sink)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Reporter writing into memory, plus a handle to read what was written
    pub fn capture() -> (Self, CapturedOutput) {
        let output = CapturedOutput::default();
        (Self::new(output.clone()), output)
    }

    /// Emit one event atomically
    pub fn report(&self, event: ProgressEvent) {
        let mut line = event.render();
        debug!(event = ?event, "progress");
        line.push('\n');

        let mut sink = self.sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // Progress output is best effort; a closed stdout must not fail a task
        let _ = sink.write_all(line.as_bytes());
        let _ = sink.flush();
    }

    pub fn start(&self, description: impl Into<String>) {
        self.report(ProgressEvent::Start(description.into()));
    }

    pub fn batch(&self, description: impl Into<String>, index: usize, total: usize) {
        self.report(ProgressEvent::BatchProgress {
            description: description.into(),
            index,
            total,
        });
    }

    pub fn done(&self, description: impl Into<String>) {
        self.report(ProgressEvent::Done(description.into()));
    }

    pub fn error(&self, description: impl Into<String>) {
        self.report(ProgressEvent::Error(description.into()));
    }
}

/// In-memory output of a reporter created with [`ProgressReporter::capture`]
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedOutput {
    pub fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        String::from_utf8_lossy(&buffer).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut buffer = self.buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Format items as an indented bullet list
pub fn format_list<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|item| format!("  - {}", item.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}
