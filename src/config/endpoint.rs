//! Endpoint addresses.
//!
//! Accepts `host:port`, `[v6]:port` and the short `:port` form, where the
//! host is filled in by the caller (listeners bind all interfaces, the
//! upstream dials loopback).

use std::fmt;

use thiserror::Error;

/// Host used for `:port` listener addresses.
pub const ANY_HOST: &str = "0.0.0.0";

/// Host used for a `:port` upstream address.
pub const LOOPBACK_HOST: &str = "127.0.0.1";

/// Error parsing an endpoint address.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("address '{0}' is missing a port")]
    MissingPort(String),

    #[error("address '{0}' has an invalid port")]
    InvalidPort(String),

    #[error("address '{0}' has an empty host")]
    EmptyHost(String),
}

/// A (host, port) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointAddress {
    host: String,
    port: u16,
}

impl EndpointAddress {
    /// Parse an address, using `default_host` for the `:port` form.
    pub fn parse(raw: &str, default_host: &str) -> Result<Self, EndpointError> {
        let raw = raw.trim();
        let (host, port) = raw
            .rsplit_once(':')
            .ok_or_else(|| EndpointError::MissingPort(raw.to_string()))?;

        let port: u16 = port
            .parse()
            .map_err(|_| EndpointError::InvalidPort(raw.to_string()))?;

        let host = host.trim_start_matches('[').trim_end_matches(']');
        let host = if host.is_empty() {
            if raw.starts_with('[') {
                return Err(EndpointError::EmptyHost(raw.to_string()));
            }
            default_host.to_string()
        } else {
            host.to_string()
        };

        Ok(Self { host, port })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Plaintext HTTP URI for dialing this endpoint.
    pub fn to_http_uri(&self) -> String {
        format!("http://{}", self)
    }
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
