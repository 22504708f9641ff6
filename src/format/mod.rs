//! Log record formatting.
//!
//! # Data Flow
//! ```text
//! LogEvent
//!     → formatter.rs (message policy, tag promotion, payload assembly)
//!     → template.rs  (prefix line from the message format)
//!     → encoder.rs   (ASCII-only single-line JSON)
//! ```

pub mod encoder;
pub mod formatter;
pub mod template;

pub use formatter::{FormattedRecord, JsonFormatter, ResolvedTags, ROOT_TAGS};
pub use template::interpolate;
