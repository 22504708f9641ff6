//! Ambient tag state.
//!
//! # Data Flow
//! ```text
//! CorrelationLayer (per request)
//!     → registry.rs (set_tag on the request-scoped registry)
//!     → sink.rs (mirror into an external tag sink, if configured)
//!
//! Logger (per record)
//!     → TagRegistry::current() snapshot
//!     → formatter (root tags promoted, the rest nested under "tags")
//! ```
//!
//! # Design Decisions
//! - Tags are never cleared automatically; writers overwrite
//! - A process-wide registry exists for code running outside any request
//! - Requests run inside a task-local fork of the process registry so
//!   concurrently handled requests never see each other's tags

pub mod registry;
pub mod sink;

pub use registry::{set_tag, Tag, TagRegistry, TagScope};
pub use sink::{TagSink, TracingTagSink};
