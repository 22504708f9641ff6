//! HTTP side of request tracing.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, demo handlers)
//!     → middleware.rs (correlation ids, request tags, outbound activation)
//!     → context.rs (task-local ids, header read/write)
//!     → handler
//!     → propagate.rs (spawned work keeps the request scope)
//! ```

pub mod context;
pub mod headers;
pub mod middleware;
pub mod propagate;
pub mod server;

pub use context::{new_uuid, CorrelationContext, IdFactory, IdGenerator};
pub use headers::{CAUSATION_ID, CORRELATION_ID, REQUEST_ID, X_CAUSATION_ID, X_CORRELATION_ID, X_REQUEST_ID};
pub use middleware::{CorrelationLayer, CorrelationLayerBuilder, CorrelationService};
pub use propagate::{spawn, spawn_blocking, InCurrentRequest, RequestScope, ScopedFuture};
pub use server::{AppState, HttpServer};
