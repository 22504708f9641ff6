//! JSON log formatter.
//!
//! # Responsibilities
//! - Decide how the message is represented (scalar, structured, stringified)
//! - Merge ambient tags with the call-site `source_path`
//! - Promote the correlation ids to the payload's top level
//! - Render the human-readable prefix through the template interpolator
//!
//! # Output
//! ```text
//! <prefix>\t{"log_message":...,"args":{...},"level":"INFO","timestamp":"...","tags":{...},"x-request-id":"...",...}
//! ```

use std::fmt;

use chrono::SecondsFormat;
use serde_json::{Map, Value};

use crate::format::{encoder, template};
use crate::http::headers::{CAUSATION_ID, CORRELATION_ID, REQUEST_ID};
use crate::logging::{LogEvent, Severity};

/// Tags promoted out of `tags` to the top level of the payload.
pub const ROOT_TAGS: [&str; 3] = [REQUEST_ID, CORRELATION_ID, CAUSATION_ID];

/// Key of the synthesized `module.function:line` tag.
pub const SOURCE_PATH: &str = "source_path";

pub const DEFAULT_MESSAGE_FORMAT: &str = "[{level}] {timestamp} {msg}";

/// Tags split into promoted and nested halves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedTags {
    pub root: Map<String, Value>,
    pub nested: Map<String, Value>,
}

/// The two durable halves of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedRecord {
    pub prefix: String,
    pub payload: String,
}

impl FormattedRecord {
    /// `prefix \t payload`
    pub fn line(&self) -> String {
        format!("{}\t{}", self.prefix, self.payload)
    }
}

impl fmt::Display for FormattedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.prefix, self.payload)
    }
}

#[derive(Debug, Clone)]
pub struct JsonFormatter {
    message_format: String,
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_MESSAGE_FORMAT)
    }
}

impl JsonFormatter {
    pub fn new(message_format: impl Into<String>) -> Self {
        Self {
            message_format: message_format.into(),
        }
    }

    pub fn message_format(&self) -> &str {
        &self.message_format
    }

    /// Scalars pass through. Mappings and sequences stay structured at
    /// DEBUG and are stringified to compact JSON at every other severity;
    /// the severity itself is never changed.
    pub fn render_message(event: &LogEvent) -> Value {
        match &event.message {
            Value::Object(_) | Value::Array(_) if event.severity != Severity::Debug => {
                Value::String(event.message.to_string())
            }
            other => other.clone(),
        }
    }

    /// Ambient tags plus `source_path`, with the root tags split out.
    pub fn resolve_tags(event: &LogEvent) -> ResolvedTags {
        let mut resolved = ResolvedTags::default();
        for (key, tag) in &event.tags {
            let value = Value::from(tag);
            if ROOT_TAGS.contains(&key.as_str()) {
                resolved.root.insert(key.clone(), value);
            } else {
                resolved.nested.insert(key.clone(), value);
            }
        }
        resolved
            .nested
            .insert(SOURCE_PATH.to_string(), Value::String(event.call_site.source_path()));
        resolved
    }

    pub fn format(&self, event: &LogEvent) -> FormattedRecord {
        let message = Self::render_message(event);
        let msg = match &message {
            Value::String(text) if !event.args.is_empty() => {
                template::interpolate(text, &Value::Object(event.args.clone()))
            }
            other => template::render_value(other),
        };
        let timestamp = event
            .created_at
            .to_rfc3339_opts(SecondsFormat::Micros, true);
        let source_path = event.call_site.source_path();
        let ResolvedTags { root, nested } = Self::resolve_tags(event);

        let mut payload = Map::new();
        payload.insert("log_message".into(), message.clone());
        payload.insert("args".into(), Value::Object(event.args.clone()));
        payload.insert("level".into(), Value::String(event.severity.as_str().into()));
        payload.insert("timestamp".into(), Value::String(timestamp.clone()));
        payload.insert("tags".into(), Value::Object(nested));
        for (key, value) in &root {
            payload.insert(key.clone(), value.clone());
        }
        payload.insert(SOURCE_PATH.into(), Value::String(source_path.clone()));
        if let Some(exc) = &event.exc_info {
            payload.insert("exc_info".into(), Value::String(exc.clone()));
        }
        if let Some(stack) = &event.stack_info {
            payload.insert("stack_info".into(), Value::String(stack.clone()));
        }

        // Prefix context: record fields, the payload, the full unpromoted
        // tags and the interpolated message.
        let mut context = event.extra.clone();
        context.insert("name".into(), Value::String(event.logger.clone()));
        context.insert("levelno".into(), Value::from(event.severity.levelno()));
        context.insert(
            "created".into(),
            Value::from(event.created_at.timestamp_micros() as f64 / 1_000_000.0),
        );
        context.insert("module".into(), Value::String(event.call_site.module.into()));
        context.insert("function".into(), Value::String(event.call_site.function.into()));
        context.insert("line".into(), Value::from(event.call_site.line));
        context.insert("thread".into(), Value::String(event.thread.clone()));
        context.insert("process".into(), Value::from(event.process));
        if let Some(level) = event.stack_level {
            context.insert("stack_level".into(), Value::from(level));
        }
        for (key, value) in &payload {
            context.insert(key.clone(), value.clone());
        }
        let mut all_tags: Map<String, Value> = event
            .tags
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v)))
            .collect();
        all_tags.insert(SOURCE_PATH.into(), Value::String(source_path));
        context.insert("tags".into(), Value::Object(all_tags));
        context.insert("msg".into(), Value::String(msg));

        FormattedRecord {
            prefix: template::interpolate(&self.message_format, &Value::Object(context)),
            payload: encoder::to_ascii_json(&Value::Object(payload)),
        }
    }
}
