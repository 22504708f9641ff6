//! Request tracing for axum services: correlation ids, ambient tags and a
//! JSON structured logger.

pub mod config;
pub mod format;
pub mod http;
pub mod logging;
pub mod outbound;
pub mod tags;

pub use config::schema::TraceConfig;
pub use http::{CorrelationContext, CorrelationLayer, HttpServer};
pub use logging::{get_logger, get_logger_with, Logger, LoggerOptions, Severity};
pub use tags::{set_tag, Tag, TagRegistry, TagScope};
