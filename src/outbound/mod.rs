//! Outbound call interception.
//!
//! # Responsibilities
//! - Keep one hook point per HTTP client family ([`HttpStrategy`])
//! - Inject the current request's correlation ids into outbound calls
//! - Stay idempotent when many middleware instances install the same hook
//!
//! # Data Flow
//! ```text
//! TracedClient::get(url) / PropagationService::call(req)
//!     → OutboundHooks::apply(strategy, ..)
//!         → installed interceptor (CorrelationHook reads the task-local context)
//!         → original hook (registered by the host, e.g. DefaultHeaders)
//!     → underlying client
//! ```

pub mod client;
pub mod hooks;
pub mod layer;

pub use client::TracedClient;
pub use hooks::{
    CorrelationHook, DefaultHeaders, HttpStrategy, OutboundHooks, OutboundStrategy, Passthrough, RequestHook,
    SharedHook,
};
pub use layer::{PropagationLayer, PropagationService};
