//! Structured logger façade.
//!
//! # Data Flow
//! ```text
//! log_info!(logger, "template {field}", field = value)
//!     → macros.rs (skip everything if the severity is filtered,
//!                  capture fields into the args bag, record the call site)
//!     → record.rs (LogEvent under construction)
//!     → logger.rs (attach current tags, format, write to sink,
//!                  optionally forward to the tracing subscriber)
//!     → format::formatter (prefix \t JSON payload)
//! ```
//!
//! # Design Decisions
//! - One logger per name, cached; the first configuration wins
//! - Messages are templates; arguments stay structured in the payload
//! - Records do not propagate to the host subscriber unless asked

#[macro_use]
mod macros;

pub mod logger;
pub mod record;
pub mod severity;
pub mod sink;

pub use logger::{get_logger, get_logger_with, Logger, LoggerOptions, Loggers};
pub use record::{CallSite, LogEvent, Record};
pub use severity::{ParseSeverityError, Severity};
pub use sink::{LogSink, MemorySink, StderrSink, StdoutSink, WriterSink};
