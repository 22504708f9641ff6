//! Output sinks for formatted log lines.
//!
//! Write failures are swallowed: a log call never fails its caller.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

/// Accepts one formatted line for durable output.
pub trait LogSink: Send + Sync {
    fn write_line(&self, line: &str);
}

/// Process standard error.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrSink;

impl LogSink for StderrSink {
    fn write_line(&self, line: &str) {
        let _ = writeln!(io::stderr().lock(), "{line}");
    }
}

/// Process standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write_line(&self, line: &str) {
        let _ = writeln!(io::stdout().lock(), "{line}");
    }
}

/// Any `Write` implementation, e.g. a file.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl<W: Write + Send> LogSink for WriterSink<W> {
    fn write_line(&self, line: &str) {
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let _ = writeln!(writer, "{line}");
        let _ = writer.flush();
    }
}

/// Keeps lines in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.guard().clone()
    }

    /// Drain and return the buffered lines.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.guard())
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<String>> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, line: &str) {
        self.guard().push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_shares_buffer() {
        let sink = MemorySink::new();
        let handle = sink.clone();
        sink.write_line("one");
        sink.write_line("two");

        assert_eq!(handle.lines(), vec!["one", "two"]);
        assert_eq!(handle.take().len(), 2);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_writer_sink_appends_newlines() {
        let sink = WriterSink::new(Vec::new());
        sink.write_line("a\tb");
        sink.write_line("c");

        assert_eq!(String::from_utf8(sink.into_inner()).unwrap(), "a\tb\nc\n");
    }
}
