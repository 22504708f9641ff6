//! Correlation identifiers of the request being handled.
//!
//! # Responsibilities
//! - Generate ids (pluggable factory + optional prefix)
//! - Derive the per-request context from inbound headers
//! - Expose the context to code running inside the request (task-local)
//! - Write ids into inbound and outbound header maps
//!
//! The context is task-local: work spawned from a handler must be bound to
//! it with [`crate::http::spawn`] or
//! [`InCurrentRequest`](crate::http::InCurrentRequest).
//!
//! # Design Decisions
//! - `correlation_id` and `causation_id` default to the request id
//! - Outbound calls carry the current request id as their causation id
//! - The request id stays the same for every outbound call of a request

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use uuid::Uuid;

use crate::http::headers::{X_CAUSATION_ID, X_CORRELATION_ID, X_REQUEST_ID};

tokio::task_local! {
    static CURRENT: CorrelationContext;
}

/// Produces the random part of a new identifier.
pub type IdFactory = Arc<dyn Fn() -> String + Send + Sync>;

/// Random UUID v4 in hyphenated form.
pub fn new_uuid() -> String {
    Uuid::new_v4().to_string()
}

/// Identifier generator: `prefix + factory()`.
#[derive(Clone)]
pub struct IdGenerator {
    factory: IdFactory,
    prefix: String,
}

impl IdGenerator {
    pub fn new(factory: IdFactory, prefix: impl Into<String>) -> Self {
        Self {
            factory,
            prefix: prefix.into(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// A new id. Factory output that is not valid header text is replaced by
    /// a UUID so the id can always be echoed.
    pub fn generate(&self) -> String {
        let id = format!("{}{}", self.prefix, (self.factory)());
        if HeaderValue::from_str(&id).is_ok() {
            return id;
        }
        tracing::warn!(id = %id, "Generated id is not valid header text, using a UUID");
        format!("{}{}", self.prefix, new_uuid())
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(Arc::new(new_uuid), "")
    }
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdGenerator")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// The three correlation identifiers of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationContext {
    pub request_id: String,
    pub correlation_id: String,
    pub causation_id: String,
}

impl CorrelationContext {
    /// A context where correlation and causation equal the request id.
    pub fn new(request_id: impl Into<String>) -> Self {
        let request_id = request_id.into();
        Self {
            correlation_id: request_id.clone(),
            causation_id: request_id.clone(),
            request_id,
        }
    }

    /// Derive the context of an inbound request.
    ///
    /// An inbound `x-request-id` is reused only when `trust_inbound_request_id`
    /// is set; otherwise a fresh id is always generated. Missing correlation
    /// and causation ids fall back to the request id.
    pub fn from_headers(headers: &HeaderMap, ids: &IdGenerator, trust_inbound_request_id: bool) -> Self {
        let request_id = trust_inbound_request_id
            .then(|| header_str(headers, &X_REQUEST_ID))
            .flatten()
            .unwrap_or_else(|| ids.generate());
        let correlation_id =
            header_str(headers, &X_CORRELATION_ID).unwrap_or_else(|| request_id.clone());
        let causation_id =
            header_str(headers, &X_CAUSATION_ID).unwrap_or_else(|| request_id.clone());

        Self {
            request_id,
            correlation_id,
            causation_id,
        }
    }

    /// Context of the request being handled on this task.
    pub fn current() -> Option<Self> {
        CURRENT.try_with(|ctx| ctx.clone()).ok()
    }

    /// Run `fut` with this context as the current one.
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        CURRENT.scope(self, fut).await
    }

    pub fn sync_scope<R>(self, f: impl FnOnce() -> R) -> R {
        CURRENT.sync_scope(self, f)
    }

    /// Write the ids onto an inbound request. The request id is always
    /// written; correlation and causation only when the caller omitted them
    /// or sent a blank value, so the request agrees with the context.
    pub fn fill_inbound(&self, headers: &mut HeaderMap) {
        insert(headers, &X_REQUEST_ID, &self.request_id);
        for (name, value) in [
            (&X_CORRELATION_ID, &self.correlation_id),
            (&X_CAUSATION_ID, &self.causation_id),
        ] {
            if header_str(headers, name).is_none() {
                insert(headers, name, value);
            }
        }
    }

    /// Headers carried by an outbound call made while handling this request.
    pub fn outbound_headers(&self) -> [(&'static HeaderName, &str); 3] {
        [
            (&X_REQUEST_ID, &self.request_id),
            (&X_CAUSATION_ID, &self.request_id),
            (&X_CORRELATION_ID, &self.correlation_id),
        ]
    }

    /// Inject the outbound headers, replacing existing values.
    pub fn apply_outbound(&self, headers: &mut HeaderMap) {
        for (name, value) in self.outbound_headers() {
            insert(headers, name, value);
        }
    }
}

fn header_str(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Insert a header, skipping values that are not valid header text.
pub(crate) fn insert(headers: &mut HeaderMap, name: &HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name.clone(), value);
        }
        Err(_) => {
            tracing::warn!(header = %name, value = %value, "Skipping invalid correlation header value");
        }
    }
}
