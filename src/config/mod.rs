//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → TraceConfig (validated, immutable)
//!     → middleware, logger and server built from its sections
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    ListenerConfig, LogOutput, LoggingConfig, MiddlewareConfig, TimeoutConfig, TraceConfig,
    UpstreamConfig,
};
pub use validation::{validate_config, ValidationError};
