//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check value ranges and formats (addresses, URLs, header text)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: TraceConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use axum::http::HeaderValue;
use thiserror::Error;

use crate::config::schema::TraceConfig;
use crate::format::template::find_unbalanced;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("id prefix '{0}' is not valid header text")]
    InvalidIdPrefix(String),

    #[error("unbalanced brace at offset {0} in logging.message_format")]
    UnbalancedFormat(usize),

    #[error("request timeout must be greater than zero")]
    ZeroTimeout,

    #[error("invalid upstream url '{url}': {reason}")]
    InvalidUpstream { url: String, reason: String },
}

/// Validate the configuration, collecting every error.
pub fn validate_config(config: &TraceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    let prefix = &config.middleware.id_prefix;
    if HeaderValue::from_str(prefix).is_err() {
        errors.push(ValidationError::InvalidIdPrefix(prefix.clone()));
    }

    if let Some(offset) = find_unbalanced(&config.logging.message_format) {
        errors.push(ValidationError::UnbalancedFormat(offset));
    }

    if let Some(raw) = config.upstream.url.as_deref().filter(|u| !u.is_empty()) {
        match url::Url::parse(raw) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => errors.push(ValidationError::InvalidUpstream {
                url: raw.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            }),
            Err(e) => errors.push(ValidationError::InvalidUpstream {
                url: raw.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
