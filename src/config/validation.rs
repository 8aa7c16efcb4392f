//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate endpoint addresses and value ranges
//! - Detect listeners configured on the same address
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::endpoint::{EndpointAddress, EndpointError, ANY_HOST, LOOPBACK_HOST};
use crate::config::schema::GatewayConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field}: {source}")]
    Address {
        field: &'static str,
        source: EndpointError,
    },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("gateway and assets listeners both bind {0}")]
    SharedBindAddress(String),

    #[error("unknown log level '{0}'")]
    LogLevel(String),
}

/// Check a loaded configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "upstream.address", &config.upstream.address, LOOPBACK_HOST);
    let gateway = check_address(&mut errors, "gateway.bind_address", &config.gateway.bind_address, ANY_HOST);
    let assets = check_address(&mut errors, "assets.bind_address", &config.assets.bind_address, ANY_HOST);

    if let (Some(gateway), Some(assets)) = (gateway, assets) {
        if gateway == assets && gateway.port() != 0 {
            errors.push(ValidationError::SharedBindAddress(gateway.to_string()));
        }
    }

    if config.upstream.connect_timeout_secs == 0 {
        errors.push(ValidationError::Zero("upstream.connect_timeout_secs"));
    }
    if config.upstream.keepalive_secs == 0 {
        errors.push(ValidationError::Zero("upstream.keepalive_secs"));
    }
    if config.gateway.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero("gateway.request_timeout_secs"));
    }
    if config.gateway.max_body_bytes == 0 {
        errors.push(ValidationError::Zero("gateway.max_body_bytes"));
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::LogLevel(config.observability.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(
    errors: &mut Vec<ValidationError>,
    field: &'static str,
    raw: &str,
    default_host: &str,
) -> Option<EndpointAddress> {
    match EndpointAddress::parse(raw, default_host) {
        Ok(addr) => Some(addr),
        Err(source) => {
            errors.push(ValidationError::Address { field, source });
            None
        }
    }
}
