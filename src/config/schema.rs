//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files; every
//! field has a default so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::format::formatter::DEFAULT_MESSAGE_FORMAT;
use crate::logging::Severity;
use crate::outbound::OutboundStrategy;
use crate::tags::TagScope;

/// Root configuration of the trace service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TraceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Correlation middleware settings.
    pub middleware: MiddlewareConfig,

    /// Structured logger settings.
    pub logging: LoggingConfig,

    /// Upstream called by the relay endpoint.
    pub upstream: UpstreamConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Correlation middleware configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MiddlewareConfig {
    /// Prepended to every generated id.
    pub id_prefix: String,

    /// Outbound client families to intercept.
    pub outbound: OutboundStrategy,

    /// Reuse an inbound `x-request-id` instead of generating one.
    pub trust_inbound_request_id: bool,

    /// Per-request tag registries, or one shared process registry.
    pub tag_scope: TagScope,

    /// Mirror request tags to the tracing subscriber.
    pub trace_tags: bool,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            id_prefix: String::new(),
            outbound: OutboundStrategy::Auto,
            trust_inbound_request_id: true,
            tag_scope: TagScope::Request,
            trace_tags: false,
        }
    }
}

/// Where structured log lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stderr,
    Stdout,
}

/// Structured logger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum severity written.
    pub level: Severity,

    /// Template of the human-readable prefix.
    pub message_format: String,

    /// Forward records to the tracing subscriber as well.
    pub propagate: bool,

    pub output: LogOutput,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Severity::Debug,
            message_format: DEFAULT_MESSAGE_FORMAT.to_string(),
            propagate: false,
            output: LogOutput::Stderr,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL for `/relay`. Relaying is disabled when unset.
    pub url: Option<String>,
}
