//! Correlation header names.
//!
//! The same names double as the root tag keys of every log payload.

use axum::http::HeaderName;

pub const REQUEST_ID: &str = "x-request-id";
pub const CORRELATION_ID: &str = "x-correlation-id";
pub const CAUSATION_ID: &str = "x-causation-id";

pub static X_REQUEST_ID: HeaderName = HeaderName::from_static(REQUEST_ID);
pub static X_CORRELATION_ID: HeaderName = HeaderName::from_static(CORRELATION_ID);
pub static X_CAUSATION_ID: HeaderName = HeaderName::from_static(CAUSATION_ID);
