//! Log events and the builder the logging macros drive.

use std::backtrace::Backtrace;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::format::encoder;
use crate::logging::{Logger, Severity};
use crate::tags::Tag;

/// Where a record was emitted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    pub module: &'static str,
    pub function: &'static str,
    pub line: u32,
}

impl CallSite {
    pub const fn new(module: &'static str, function: &'static str, line: u32) -> Self {
        Self {
            module,
            function,
            line,
        }
    }

    /// `module.function:line`
    pub fn source_path(&self) -> String {
        format!("{}.{}:{}", self.module, self.function, self.line)
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.module, self.function, self.line)
    }
}

/// One emitted record, consumed synchronously by the formatter.
#[derive(Debug, Clone)]
pub struct LogEvent {
    /// Name of the emitting logger.
    pub logger: String,
    /// Message template, or a structured value.
    pub message: Value,
    /// Keyword arguments, kept structured.
    pub args: Map<String, Value>,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
    pub call_site: CallSite,
    /// Ambient tags snapshot, attached by the logger at emission.
    pub tags: BTreeMap<String, Tag>,
    pub exc_info: Option<String>,
    pub stack_info: Option<String>,
    pub stack_level: Option<usize>,
    pub extra: Map<String, Value>,
    /// Name of the emitting thread, or its id when unnamed.
    pub thread: String,
    pub process: u32,
}

impl LogEvent {
    pub fn new(
        logger: impl Into<String>,
        severity: Severity,
        message: impl Into<Value>,
        call_site: CallSite,
    ) -> Self {
        let current = std::thread::current();
        let thread = match current.name() {
            Some(name) => name.to_owned(),
            None => format!("{:?}", current.id()),
        };
        Self {
            logger: logger.into(),
            message: message.into(),
            args: Map::new(),
            severity,
            created_at: Utc::now(),
            call_site,
            tags: BTreeMap::new(),
            exc_info: None,
            stack_info: None,
            stack_level: None,
            extra: Map::new(),
            thread,
            process: std::process::id(),
        }
    }
}

/// A record under construction. Nothing is formatted until [`Record::emit`].
#[must_use = "a record does nothing until emitted"]
pub struct Record<'a> {
    logger: &'a Logger,
    event: LogEvent,
}

impl<'a> Record<'a> {
    pub(crate) fn new(logger: &'a Logger, event: LogEvent) -> Self {
        Self { logger, event }
    }

    /// Add a structured argument.
    pub fn arg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.event.args.insert(key.into(), value);
        self
    }

    /// Attach an error and its source chain.
    pub fn exc_info<E: Error + ?Sized>(mut self, err: &E) -> Self {
        self.event.exc_info = Some(encoder::error_chain(err));
        self
    }

    /// Capture the current stack when `enabled`.
    pub fn stack_info(mut self, enabled: bool) -> Self {
        if enabled {
            self.event.stack_info = Some(encoder::backtrace_text(&Backtrace::force_capture()));
        }
        self
    }

    pub fn stack_level(mut self, level: usize) -> Self {
        self.event.stack_level = Some(level);
        self
    }

    /// Extra fields made available to the prefix template, not to `args`.
    pub fn extra(mut self, extra: Map<String, Value>) -> Self {
        self.event.extra.extend(extra);
        self
    }

    pub fn emit(self) {
        self.logger.handle(self.event);
    }
}
