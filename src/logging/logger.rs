//! Named loggers and their cache.

use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

use dashmap::DashMap;
use serde_json::Value;

use crate::config::LoggingConfig;
use crate::format::formatter::{FormattedRecord, JsonFormatter, DEFAULT_MESSAGE_FORMAT};
use crate::logging::sink::{LogSink, StderrSink, StdoutSink};
use crate::logging::{CallSite, LogEvent, Record, Severity};
use crate::tags::TagRegistry;

static GLOBAL: OnceLock<Loggers> = OnceLock::new();

/// Configuration applied when a logger is first created.
#[derive(Clone, Default)]
pub struct LoggerOptions {
    /// Minimum severity emitted. Defaults to the most verbose.
    pub level: Option<Severity>,
    /// Output sink. Defaults to standard error.
    pub sink: Option<Arc<dyn LogSink>>,
    /// Prefix template. Defaults to `"[{level}] {timestamp} {msg}"`.
    pub message_format: Option<String>,
    /// Forward records to the `tracing` subscriber as well.
    pub propagate: bool,
    /// Pin the logger to one registry instead of `TagRegistry::current()`.
    pub tags: Option<TagRegistry>,
}

impl LoggerOptions {
    pub fn level(mut self, level: Severity) -> Self {
        self.level = Some(level);
        self
    }

    pub fn sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    pub fn message_format(mut self, format: impl Into<String>) -> Self {
        self.message_format = Some(format.into());
        self
    }

    pub fn propagate(mut self, propagate: bool) -> Self {
        self.propagate = propagate;
        self
    }

    pub fn tags(mut self, registry: TagRegistry) -> Self {
        self.tags = Some(registry);
        self
    }
}

impl From<&LoggingConfig> for LoggerOptions {
    fn from(config: &LoggingConfig) -> Self {
        let sink: Arc<dyn LogSink> = match config.output {
            crate::config::LogOutput::Stderr => Arc::new(StderrSink),
            crate::config::LogOutput::Stdout => Arc::new(StdoutSink),
        };
        Self {
            level: Some(config.level),
            sink: Some(sink),
            message_format: Some(config.message_format.clone()),
            propagate: config.propagate,
            tags: None,
        }
    }
}

/// A named structured logger.
pub struct Logger {
    name: String,
    level: Severity,
    // A logger owns exactly one sink; replacing it never accumulates outputs.
    sink: RwLock<Arc<dyn LogSink>>,
    formatter: JsonFormatter,
    propagate: bool,
    tags: Option<TagRegistry>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.level)
            .field("message_format", &self.formatter.message_format())
            .field("propagate", &self.propagate)
            .finish()
    }
}

impl Logger {
    pub fn new(name: impl Into<String>, options: LoggerOptions) -> Self {
        Self {
            name: name.into(),
            level: options.level.unwrap_or_default(),
            sink: RwLock::new(options.sink.unwrap_or_else(|| Arc::new(StderrSink))),
            formatter: JsonFormatter::new(
                options
                    .message_format
                    .unwrap_or_else(|| DEFAULT_MESSAGE_FORMAT.to_string()),
            ),
            propagate: options.propagate,
            tags: options.tags,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> Severity {
        self.level
    }

    pub fn propagates(&self) -> bool {
        self.propagate
    }

    pub fn formatter(&self) -> &JsonFormatter {
        &self.formatter
    }

    pub fn enabled(&self, severity: Severity) -> bool {
        severity >= self.level
    }

    /// Replace the output sink.
    pub fn set_sink(&self, sink: Arc<dyn LogSink>) {
        *self.sink.write().unwrap_or_else(|e| e.into_inner()) = sink;
    }

    /// Start a record. Prefer the `log_*!` macros, which skip argument
    /// evaluation entirely when the severity is filtered out.
    pub fn record(&self, severity: Severity, message: impl Into<Value>, call_site: CallSite) -> Record<'_> {
        Record::new(self, LogEvent::new(self.name.clone(), severity, message, call_site))
    }

    /// Attach the current tags, format and write one event.
    pub fn handle(&self, mut event: LogEvent) {
        if !self.enabled(event.severity) {
            return;
        }

        let registry = match &self.tags {
            Some(pinned) => pinned.clone(),
            None => TagRegistry::current(),
        };
        event.tags = registry.current_tags();

        let record = self.formatter.format(&event);
        let sink = self.sink.read().unwrap_or_else(|e| e.into_inner()).clone();
        sink.write_line(&record.line());

        if self.propagate {
            forward(&event, &record);
        }
    }
}

/// Hand the record to the `tracing` subscriber of the host application.
fn forward(event: &LogEvent, record: &FormattedRecord) {
    match event.severity {
        Severity::Debug => {
            tracing::debug!(target: "request_trace::logger", logger = %event.logger, payload = %record.payload, "{}", record.prefix)
        }
        Severity::Info => {
            tracing::info!(target: "request_trace::logger", logger = %event.logger, payload = %record.payload, "{}", record.prefix)
        }
        Severity::Warning => {
            tracing::warn!(target: "request_trace::logger", logger = %event.logger, payload = %record.payload, "{}", record.prefix)
        }
        Severity::Error | Severity::Critical => {
            tracing::error!(target: "request_trace::logger", logger = %event.logger, payload = %record.payload, "{}", record.prefix)
        }
    }
}

/// Cache of loggers by name. The first configuration for a name wins.
#[derive(Debug, Default)]
pub struct Loggers {
    cache: DashMap<String, Arc<Logger>>,
}

impl Loggers {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache.
    pub fn global() -> &'static Loggers {
        GLOBAL.get_or_init(Loggers::new)
    }

    /// Get the logger called `name`, creating it with `options` if needed.
    pub fn get(&self, name: &str, options: LoggerOptions) -> Arc<Logger> {
        if let Some(existing) = self.cache.get(name) {
            return existing.clone();
        }
        self.cache
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(logger = %name, "Creating logger");
                Arc::new(Logger::new(name, options))
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// Process-wide logger with default options.
pub fn get_logger(name: &str) -> Arc<Logger> {
    Loggers::global().get(name, LoggerOptions::default())
}

/// Process-wide logger, created with `options` on first use.
pub fn get_logger_with(name: &str, options: LoggerOptions) -> Arc<Logger> {
    Loggers::global().get(name, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemorySink;
    use crate::{log_debug, log_error, log_info};
    use serde_json::json;

    fn parse(line: &str) -> Value {
        let (_, payload) = line.split_once('\t').unwrap();
        serde_json::from_str(payload).unwrap()
    }

    #[test]
    fn test_same_name_same_handle() {
        let loggers = Loggers::new();
        let sink = MemorySink::new();
        let handles: Vec<_> = (0..5)
            .map(|_| loggers.get("same", LoggerOptions::default().sink(sink.clone())))
            .collect();

        for logger in &handles {
            log_info!(logger, "test");
            assert!(Arc::ptr_eq(logger, &handles[0]));
        }
        assert_eq!(loggers.len(), 1);
        assert_eq!(sink.len(), 5);
    }

    #[test]
    fn test_first_configuration_wins() {
        let loggers = Loggers::new();
        let first = loggers.get("cfg", LoggerOptions::default().level(Severity::Error));
        let second = loggers.get("cfg", LoggerOptions::default().level(Severity::Debug));

        assert_eq!(second.level(), Severity::Error);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_filtered_records_skip_argument_evaluation() {
        let sink = MemorySink::new();
        let logger = Logger::new("quiet", LoggerOptions::default().level(Severity::Error).sink(sink.clone()));
        let mut evaluated = false;

        log_info!(logger, "never {x}", x = {
            evaluated = true;
            1
        });
        log_error!(logger, "kept");

        assert!(!evaluated);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_args_are_captured_not_formatted() {
        let sink = MemorySink::new();
        let logger = Logger::new("args", LoggerOptions::default().sink(sink.clone()));

        log_info!(logger, "hello {name}", name = "test", count = 3);

        let log = parse(&sink.lines()[0]);
        assert_eq!(log["log_message"], "hello {name}");
        assert_eq!(log["args"], json!({"name": "test", "count": 3}));
        assert_eq!(log["level"], "INFO");
        assert!(log["tags"]["source_path"]
            .as_str()
            .unwrap()
            .contains("test_args_are_captured_not_formatted"));
    }

    #[test]
    fn test_reserved_keys_bypass_args() {
        let sink = MemorySink::new();
        let logger = Logger::new("reserved", LoggerOptions::default().sink(sink.clone()).message_format("{msg} [{who}]"));
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing file");
        let mut extra = serde_json::Map::new();
        extra.insert("who".into(), json!("worker-1"));

        log_error!(logger, "failed {path}", path = "/tmp/x", exc_info = err, stack_level = 2, extra = extra);

        let line = &sink.lines()[0];
        let log = parse(line);
        assert_eq!(log["args"], json!({"path": "/tmp/x"}));
        assert_eq!(log["exc_info"], "missing file");
        assert!(line.starts_with("failed /tmp/x [worker-1]\t"));
    }

    #[test]
    fn test_pinned_registry_tags() {
        let tags = TagRegistry::new();
        tags.set_tag("x-request-id", "req-1");
        tags.set_tag("service", "billing");
        let sink = MemorySink::new();
        let logger = Logger::new("pinned", LoggerOptions::default().sink(sink.clone()).tags(tags));

        log_debug!(logger, json!({"test": "ok"}));

        let log = parse(&sink.lines()[0]);
        assert_eq!(log["log_message"], json!({"test": "ok"}));
        assert_eq!(log["x-request-id"], "req-1");
        assert_eq!(log["tags"]["service"], "billing");
    }

    #[test]
    fn test_set_sink_replaces() {
        let first = MemorySink::new();
        let second = MemorySink::new();
        let logger = Logger::new("swap", LoggerOptions::default().sink(first.clone()));

        log_info!(logger, "one");
        logger.set_sink(Arc::new(second.clone()));
        log_info!(logger, "two");

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }
}
